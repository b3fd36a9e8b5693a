//! Inbound federation for the ferry relay.
//!
//! - **Normalizer**: JSON-LD expansion of incoming documents
//! - **Activity**: typed activities hydrated from expanded nodes
//! - **Decision**: Follow / Unfollow / Forward / Invalid classification
//! - **Subscriptions**: the set of subscriber inboxes
//! - **Handlers**: the shared inbox and the relay actor document
//! - **Middleware**: `ActivityPub` header gating

pub mod activity;
pub mod decision;
pub mod error;
pub mod handler;
pub mod loader;
pub mod middleware;
pub mod normalizer;
pub mod subscriptions;
pub mod vocab;

use axum::{
    Router,
    routing::{get, post},
};

pub use activity::{Activity, HydrationError, hydrate};
pub use decision::{Decision, TargetError, actor_targets, classify, object_targets};
pub use error::InboxError;
pub use handler::*;
pub use loader::{CachingDocumentLoader, DocumentLoader};
pub use middleware::require_activitypub_headers;
pub use normalizer::{ActivityStreamsNormalizer, NormalizeError, Normalizer};
pub use subscriptions::{MemorySubscriptionManager, SubscriptionManager};

/// Federation routes: `POST /inbox` behind header gating and `GET /actor`.
pub fn router(inbox: InboxState, actor: ActorState) -> Router {
    Router::new()
        .route(
            "/inbox",
            post(inbox_handler)
                .with_state(inbox)
                .layer(axum::middleware::from_fn(require_activitypub_headers)),
        )
        .route("/actor", get(actor_handler).with_state(actor))
}
