//! Classification of hydrated activities.

use thiserror::Error;
use url::Url;

use crate::activity::Activity;
use crate::vocab;

/// What the inbox does with an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Subscribe the actor to this relay.
    Follow,
    /// Remove the actor's subscription.
    Unfollow,
    /// Redistribute to every subscriber.
    Forward,
    /// A Follow or Undo(Follow) that does not target this relay's inbox.
    Invalid,
}

/// Errors from extracting URL targets out of an activity.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("no objects found in activity")]
    NoObjects,

    #[error("no actors found in activity")]
    NoActors,

    #[error("activity has object with ID {id} that is not a valid URL: {source}")]
    InvalidObjectId {
        id: String,
        source: url::ParseError,
    },

    #[error("activity has actor with ID {id} that is not a valid URL: {source}")]
    InvalidActorId {
        id: String,
        source: url::ParseError,
    },
}

/// Classify an activity against this relay's inbox IRI.
///
/// Types are examined in declaration order and the first rule that applies
/// wins. A Follow must name `inbox_iri` as one of its objects. An Undo that
/// wraps a Follow must have that Follow name `inbox_iri`. Anything else is
/// forwarded.
#[must_use]
pub fn classify(activity: &Activity, inbox_iri: &str) -> Decision {
    for kind in &activity.types {
        if kind == vocab::FOLLOW {
            return if targets_inbox(activity, inbox_iri) {
                Decision::Follow
            } else {
                Decision::Invalid
            };
        }

        if kind == vocab::UNDO
            && let Some(follow) = activity.object.iter().find(|o| o.has_type(vocab::FOLLOW))
        {
            return if targets_inbox(follow, inbox_iri) {
                Decision::Unfollow
            } else {
                Decision::Invalid
            };
        }
    }

    Decision::Forward
}

fn targets_inbox(activity: &Activity, inbox_iri: &str) -> bool {
    activity.object.iter().any(|o| o.id() == Some(inbox_iri))
}

/// Parse every non-null `object` id as a URL.
pub fn object_targets(activity: &Activity) -> Result<Vec<Url>, TargetError> {
    let mut targets = Vec::with_capacity(activity.object.len());
    for id in activity.object.iter().filter_map(Activity::id) {
        let url = Url::parse(id).map_err(|source| TargetError::InvalidObjectId {
            id: id.to_string(),
            source,
        })?;
        targets.push(url);
    }

    if targets.is_empty() {
        return Err(TargetError::NoObjects);
    }
    Ok(targets)
}

/// Parse every non-null `actor` id as a URL.
pub fn actor_targets(activity: &Activity) -> Result<Vec<Url>, TargetError> {
    let mut targets = Vec::with_capacity(activity.actor.len());
    for id in activity.actor.iter().filter_map(Activity::id) {
        let url = Url::parse(id).map_err(|source| TargetError::InvalidActorId {
            id: id.to_string(),
            source,
        })?;
        targets.push(url);
    }

    if targets.is_empty() {
        return Err(TargetError::NoActors);
    }
    Ok(targets)
}
