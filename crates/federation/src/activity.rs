//! Typed activities hydrated from expanded JSON-LD nodes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::vocab;

/// Errors produced while turning an expanded node into an [`Activity`].
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("unsupported activity type")]
    UnsupportedActivityType,

    #[error("activity id cannot be null or missing")]
    NullOrMissingId,

    #[error("activity could not be converted properly: {0}")]
    Malformed(String),
}

/// A node of the ActivityStreams vocabulary in expanded form.
///
/// `object` and `actor` are repeated relations; a single nested node is
/// accepted and read as a one-element list. Everything the relay does not
/// interpret is kept in `extra` so a forwarded activity carries every
/// property it arrived with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(
        rename = "@id",
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Option<String>>,

    #[serde(
        rename = "@type",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub types: Vec<String>,

    #[serde(
        rename = "https://www.w3.org/ns/activitystreams#object",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub object: Vec<Activity>,

    #[serde(
        rename = "https://www.w3.org/ns/activitystreams#actor",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub actor: Vec<Activity>,

    #[serde(
        rename = "https://www.w3.org/ns/activitystreams#target",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target: Option<Value>,

    #[serde(
        rename = "https://www.w3.org/ns/activitystreams#result",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,

    #[serde(
        rename = "https://www.w3.org/ns/activitystreams#origin",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin: Option<Value>,

    #[serde(
        rename = "https://www.w3.org/ns/activitystreams#instrument",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub instrument: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// The id, if present. An empty string is a present id.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match &self.id {
            Some(Some(id)) => Some(id),
            _ => None,
        }
    }

    /// Whether the node declares `iri` among its types.
    #[must_use]
    pub fn has_type(&self, iri: &str) -> bool {
        self.types.iter().any(|t| t == iri)
    }
}

/// Keeps `null` distinguishable from an absent field.
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(values) => values,
        OneOrMany::One(value) => vec![value],
    })
}

/// Convert one expanded node into an [`Activity`].
///
/// Every declared type must be on the allow-list and the id must be present.
/// A node that declares no type at all is rejected as unsupported.
pub fn hydrate(node: &Value) -> Result<Activity, HydrationError> {
    if !node.is_object() {
        return Err(HydrationError::Malformed(
            "expanded node is not an object".to_string(),
        ));
    }

    let activity = Activity::deserialize(node)
        .map_err(|e| HydrationError::Malformed(e.to_string()))?;

    if activity.types.is_empty() || !activity.types.iter().all(|t| vocab::is_allowed_type(t)) {
        return Err(HydrationError::UnsupportedActivityType);
    }

    if activity.id().is_none() {
        return Err(HydrationError::NullOrMissingId);
    }

    Ok(activity)
}
