//! Forward task: POST one activity payload to one subscriber inbox.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::CONTENT_TYPE, redirect};
use tracing::{debug, warn};
use url::Url;

use crate::task::{Task, TaskError, TaskId};

/// Content type of forwarded activities.
pub const ACTIVITY_CONTENT_TYPE: &str = "application/ld+json";

/// Error type for a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Delivery rejected with status {status}")]
    Status { status: u16 },
}

/// Build the HTTP client shared by all forward tasks.
///
/// Redirects are not followed so a 3xx answer is reported as-is.
pub fn delivery_client(timeout: Duration, user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(user_agent)
        .redirect(redirect::Policy::none())
        .build()
}

/// A single delivery of `payload` to `target`.
///
/// The task is single-shot: it never retries and applies no timeout of its
/// own beyond what the client was built with.
#[derive(Debug, Clone)]
pub struct ForwardTask {
    id: TaskId,
    target: Url,
    payload: Bytes,
    client: Client,
}

impl ForwardTask {
    /// Create a forward task.
    #[must_use]
    pub fn new(id: TaskId, target: Url, payload: impl Into<Bytes>, client: Client) -> Self {
        Self {
            id,
            target,
            payload: payload.into(),
            client,
        }
    }

    /// Subscriber inbox the payload goes to.
    #[must_use]
    pub const fn target(&self) -> &Url {
        &self.target
    }

    /// Activity bytes sent verbatim as the request body.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// POST the payload once.
    ///
    /// Succeeds iff the transport reports no error and the status is below 400.
    pub async fn deliver(&self) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.target.clone())
            .header(CONTENT_TYPE, ACTIVITY_CONTENT_TYPE)
            .body(self.payload.clone())
            .send()
            .await?;

        let status = response.status();
        // Dropping the response releases the connection on every path.
        drop(response);

        if status.as_u16() >= 400 {
            warn!(task_id = %self.id, target = %self.target, status = %status, "Forward rejected");
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }

        debug!(task_id = %self.id, target = %self.target, status = %status, "Forward delivered");
        Ok(())
    }
}

#[async_trait]
impl Task for ForwardTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.deliver().await.map_err(TaskError::from)
    }
}
