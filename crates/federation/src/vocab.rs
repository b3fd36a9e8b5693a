//! ActivityStreams vocabulary IRIs used by the relay.

#![allow(missing_docs)]

/// ActivityStreams 2.0 namespace.
pub const AS_NS: &str = "https://www.w3.org/ns/activitystreams#";

/// ActivityStreams 2.0 context document.
pub const AS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Security vocabulary namespace.
pub const SEC_NS: &str = "https://w3id.org/security#";

/// Security context document published on the relay actor.
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";

/// Security context documents accepted alongside the ActivityStreams context.
pub const SECURITY_CONTEXTS: &[&str] = &[
    SECURITY_CONTEXT,
    "https://web-payments.org/contexts/security-v1.jsonld",
];

// Activity types

pub const FOLLOW: &str = "https://www.w3.org/ns/activitystreams#Follow";
pub const UNDO: &str = "https://www.w3.org/ns/activitystreams#Undo";
pub const CREATE: &str = "https://www.w3.org/ns/activitystreams#Create";
pub const READ: &str = "https://www.w3.org/ns/activitystreams#Read";
pub const UPDATE: &str = "https://www.w3.org/ns/activitystreams#Update";
pub const DELETE: &str = "https://www.w3.org/ns/activitystreams#Delete";

// Relations

pub const OBJECT: &str = "https://www.w3.org/ns/activitystreams#object";
pub const ACTOR: &str = "https://www.w3.org/ns/activitystreams#actor";

/// Activity types the relay accepts.
pub const ALLOWED_TYPES: &[&str] = &[FOLLOW, CREATE, READ, UPDATE, DELETE, UNDO];

/// Whether `iri` is an accepted activity type.
#[must_use]
pub fn is_allowed_type(iri: &str) -> bool {
    ALLOWED_TYPES.contains(&iri)
}
