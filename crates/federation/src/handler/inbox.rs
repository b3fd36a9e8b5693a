//! Shared inbox: subscription requests and activity redistribution.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::StatusCode,
};
use ferry_queue::{ForwardTask, TaskId, TaskQueue, TaskStorage};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::activity::{Activity, hydrate};
use crate::decision::{Decision, actor_targets, classify, object_targets};
use crate::error::InboxError;
use crate::normalizer::Normalizer;
use crate::subscriptions::SubscriptionManager;
use crate::vocab;

/// Default request body limit (16 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// State required for the inbox handler.
#[derive(Clone)]
pub struct InboxState {
    pub normalizer: Arc<dyn Normalizer>,
    pub subscriptions: Arc<dyn SubscriptionManager>,
    pub storage: Arc<dyn TaskStorage>,
    pub queue: Arc<dyn TaskQueue>,
    /// Client handed to every forward task.
    pub client: Client,
    /// This relay's inbox IRI. Follow activities must name it as their object.
    pub inbox_url: Url,
    pub max_body_bytes: usize,
}

impl InboxState {
    /// Create a new inbox state with the default body limit.
    #[must_use]
    pub fn new(
        normalizer: Arc<dyn Normalizer>,
        subscriptions: Arc<dyn SubscriptionManager>,
        storage: Arc<dyn TaskStorage>,
        queue: Arc<dyn TaskQueue>,
        client: Client,
        inbox_url: Url,
    ) -> Self {
        Self {
            normalizer,
            subscriptions,
            storage,
            queue,
            client,
            inbox_url,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Replace the request body limit.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Process one raw request body.
    ///
    /// Every node is hydrated before any of them is acted upon. Activities
    /// are then handled in order; the first failure stops processing, and
    /// whatever earlier activities changed stays changed.
    pub async fn receive(&self, body: &[u8]) -> Result<(), InboxError> {
        let document: Value = serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "Rejected malformed JSON");
            InboxError::MalformedInput("incorrect json request format".to_string())
        })?;

        let nodes = self.normalizer.expand(document).await?;
        let activities = nodes.iter().map(hydrate).collect::<Result<Vec<_>, _>>()?;

        for activity in &activities {
            let decision = classify(activity, self.inbox_url.as_str());
            debug!(id = activity.id().unwrap_or_default(), ?decision, "Classified activity");

            match decision {
                Decision::Follow => self.follow(activity).await?,
                Decision::Unfollow => self.unfollow(activity).await?,
                Decision::Forward => self.forward(activity).await?,
                Decision::Invalid => {
                    return Err(InboxError::InvalidFollowOrUnfollowTarget(
                        "invalid activitypub type".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn check_inbox_target(&self, activity: &Activity, verb: &str) -> Result<(), InboxError> {
        let objects = object_targets(activity).map_err(|e| {
            InboxError::InvalidFollowOrUnfollowTarget(format!("invalid {verb} target: {e}"))
        })?;

        if !objects.contains(&self.inbox_url) {
            return Err(InboxError::InvalidFollowOrUnfollowTarget(format!(
                "{verb} targets can only be the inbox of this server"
            )));
        }
        Ok(())
    }

    async fn follow(&self, activity: &Activity) -> Result<(), InboxError> {
        self.check_inbox_target(activity, "follow")?;

        let actors = actor_targets(activity).map_err(|e| {
            InboxError::ActorResolutionFailure(format!("invalid follow source: {e}"))
        })?;

        for actor in actors {
            if !self.subscriptions.add(actor.clone()).await {
                return Err(InboxError::SubscriptionMutationFailure(format!(
                    "could not follow URL: {actor}"
                )));
            }
            info!(subscriber = %actor, "Subscriber added");
        }
        Ok(())
    }

    async fn unfollow(&self, activity: &Activity) -> Result<(), InboxError> {
        for follow in activity.object.iter().filter(|o| o.has_type(vocab::FOLLOW)) {
            self.check_inbox_target(follow, "unfollow")?;
        }

        let actors = actor_targets(activity).map_err(|e| {
            InboxError::ActorResolutionFailure(format!("invalid unfollow source: {e}"))
        })?;

        for actor in actors {
            if self.subscriptions.remove(&actor).await {
                info!(subscriber = %actor, "Subscriber removed");
            } else {
                let err = InboxError::SubscriptionMutationFailure(format!(
                    "could not unfollow URL: {actor}"
                ));
                warn!(error = %err, "Unfollow of unknown subscriber");
            }
        }
        Ok(())
    }

    async fn forward(&self, activity: &Activity) -> Result<(), InboxError> {
        let payload = serde_json::to_vec(activity)
            .map(bytes::Bytes::from)
            .map_err(|e| InboxError::StorageFailure(format!("could not serialize activity: {e}")))?;

        let targets = self.subscriptions.list().await;
        debug!(
            id = activity.id().unwrap_or_default(),
            subscribers = targets.len(),
            "Forwarding activity"
        );

        for target in targets {
            let id = TaskId::generate();
            let task = ForwardTask::new(id.clone(), target.clone(), payload.clone(), self.client.clone());

            if !self.storage.put(Arc::new(task), id.clone()).await {
                let err = InboxError::StorageFailure(format!("could not store forward to {target}"));
                warn!(task_id = %id, error = %err, "Forward dropped");
                continue;
            }

            if !self.queue.enqueue(id.clone()).await {
                let err = InboxError::EnqueueFailure(format!("could not enqueue forward to {target}"));
                warn!(task_id = %id, error = %err, "Forward dropped");
            }
        }
        Ok(())
    }
}

/// Handle a POST to the shared inbox.
pub async fn inbox_handler(
    State(state): State<InboxState>,
    body: Body,
) -> Result<StatusCode, InboxError> {
    let body = to_bytes(body, state.max_body_bytes).await.map_err(|e| {
        debug!(error = %e, "Could not read inbox body");
        InboxError::OversizedInput("could not read http request".to_string())
    })?;

    state.receive(&body).await?;
    Ok(StatusCode::OK)
}
