//! Remote JSON-LD context documents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::ACCEPT};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::normalizer::NormalizeError;

const CONTEXT_ACCEPT: &str = "application/ld+json, application/json;q=0.9";

/// Fetches the document behind a remote `@context` IRI.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the JSON document published at `iri`.
    async fn load(&self, iri: &str) -> Result<Arc<Value>, NormalizeError>;
}

/// HTTP document loader that keeps every document it fetched.
///
/// Context documents are effectively immutable, so entries never expire.
pub struct CachingDocumentLoader {
    client: Client,
    cache: RwLock<HashMap<String, Arc<Value>>>,
}

impl CachingDocumentLoader {
    /// Create a loader on top of an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a loader with its own client. Redirects are followed.
    pub fn with_timeout(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self::new(client))
    }

    /// Number of cached documents.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Whether nothing has been fetched yet.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    async fn fetch(&self, iri: &str) -> Result<Value, String> {
        let response = self
            .client
            .get(iri)
            .header(ACCEPT, CONTEXT_ACCEPT)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }
        response.json::<Value>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl DocumentLoader for CachingDocumentLoader {
    async fn load(&self, iri: &str) -> Result<Arc<Value>, NormalizeError> {
        if let Some(document) = self.cache.read().await.get(iri) {
            return Ok(document.clone());
        }

        let document = Arc::new(self.fetch(iri).await.map_err(|reason| {
            warn!(context = iri, reason = %reason, "Could not load remote context");
            NormalizeError::ContextLoad {
                iri: iri.to_string(),
                reason,
            }
        })?);
        debug!(context = iri, "Loaded remote context");

        self.cache
            .write()
            .await
            .insert(iri.to_string(), document.clone());
        Ok(document)
    }
}
