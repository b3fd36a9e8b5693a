//! Inbox error taxonomy and its HTTP mapping.

use axum::{
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use ferry_queue::DeliveryError;
use thiserror::Error;

use crate::activity::HydrationError;
use crate::normalizer::NormalizeError;

/// Everything that can go wrong while processing one inbox request.
///
/// The message of each variant is the diagnostic sent back to the caller.
#[derive(Debug, Error)]
pub enum InboxError {
    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    OversizedInput(String),

    #[error("{0}")]
    NormalizationFailure(String),

    #[error("{0}")]
    UnsupportedActivityType(String),

    #[error("{0}")]
    NullOrMissingId(String),

    #[error("{0}")]
    InvalidFollowOrUnfollowTarget(String),

    #[error("{0}")]
    ActorResolutionFailure(String),

    #[error("{0}")]
    SubscriptionMutationFailure(String),

    #[error("{0}")]
    StorageFailure(String),

    #[error("{0}")]
    EnqueueFailure(String),

    #[error("{0}")]
    DeliveryFailure(String),
}

impl InboxError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::OversizedInput(_) => StatusCode::NOT_ACCEPTABLE,

            Self::MalformedInput(_)
            | Self::NormalizationFailure(_)
            | Self::UnsupportedActivityType(_)
            | Self::NullOrMissingId(_)
            | Self::InvalidFollowOrUnfollowTarget(_)
            | Self::SubscriptionMutationFailure(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            Self::ActorResolutionFailure(_)
            | Self::StorageFailure(_)
            | Self::EnqueueFailure(_)
            | Self::DeliveryFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code used in logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "MALFORMED_INPUT",
            Self::OversizedInput(_) => "OVERSIZED_INPUT",
            Self::NormalizationFailure(_) => "NORMALIZATION_FAILURE",
            Self::UnsupportedActivityType(_) => "UNSUPPORTED_ACTIVITY_TYPE",
            Self::NullOrMissingId(_) => "NULL_OR_MISSING_ID",
            Self::InvalidFollowOrUnfollowTarget(_) => "INVALID_FOLLOW_TARGET",
            Self::ActorResolutionFailure(_) => "ACTOR_RESOLUTION_FAILURE",
            Self::SubscriptionMutationFailure(_) => "SUBSCRIPTION_MUTATION_FAILURE",
            Self::StorageFailure(_) => "STORAGE_FAILURE",
            Self::EnqueueFailure(_) => "ENQUEUE_FAILURE",
            Self::DeliveryFailure(_) => "DELIVERY_FAILURE",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for InboxError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Inbox request failed");
        } else {
            tracing::debug!(error = %self, code = code, "Inbox request rejected");
        }

        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

// === From implementations ===

impl From<NormalizeError> for InboxError {
    fn from(err: NormalizeError) -> Self {
        Self::NormalizationFailure(err.to_string())
    }
}

impl From<HydrationError> for InboxError {
    fn from(err: HydrationError) -> Self {
        let message = format!("could not convert json to activitypub form: {err}");
        match err {
            HydrationError::UnsupportedActivityType => Self::UnsupportedActivityType(message),
            HydrationError::NullOrMissingId => Self::NullOrMissingId(message),
            HydrationError::Malformed(_) => Self::MalformedInput(message),
        }
    }
}

impl From<DeliveryError> for InboxError {
    fn from(err: DeliveryError) -> Self {
        Self::DeliveryFailure(err.to_string())
    }
}
