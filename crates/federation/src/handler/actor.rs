//! The relay's own `Application` actor.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use ferry_common::{AppResult, Config, KeyStore};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::vocab::{AS_CONTEXT, SECURITY_CONTEXT};

/// Content type of actor documents.
pub const ACTOR_CONTENT_TYPE: &str = "application/activity+json; charset=utf-8";

/// `ActivityPub` Application actor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Url,
    pub url: Url,
    pub inbox: Url,
    pub outbox: Url,
    pub following: Url,
    pub followers: Url,
    pub name: String,
    pub summary: String,
    pub public_key: ActorPublicKey,
}

/// Public key published on the actor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorPublicKey {
    pub id: Url,
    pub owner: Url,
    pub public_key_pem: String,
}

impl ActorDocument {
    /// Build the relay actor from the configured host and key pair.
    pub fn new(config: &Config, keys: &KeyStore) -> AppResult<Self> {
        let actor = config.actor_url()?;
        Ok(Self {
            context: vec![AS_CONTEXT.to_string(), SECURITY_CONTEXT.to_string()],
            kind: "Application".to_string(),
            url: actor.clone(),
            inbox: config.inbox_url()?,
            outbox: config.route_url("/outbox", None)?,
            following: config.route_url("/following", None)?,
            followers: config.route_url("/followers", None)?,
            name: "ferry relay".to_string(),
            summary: "An ActivityPub Relay".to_string(),
            public_key: ActorPublicKey {
                id: config.route_url("/actor", Some("main-key"))?,
                owner: actor.clone(),
                public_key_pem: keys.public_key_pem().to_string(),
            },
            id: actor,
        })
    }
}

/// State required for the actor handler.
#[derive(Clone)]
pub struct ActorState {
    pub document: ActorDocument,
}

impl ActorState {
    #[must_use]
    pub const fn new(document: ActorDocument) -> Self {
        Self { document }
    }
}

/// Handle GET /actor.
pub async fn actor_handler(State(state): State<ActorState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, ACTOR_CONTENT_TYPE)],
        Json(state.document),
    )
}
