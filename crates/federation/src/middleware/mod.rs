//! Request gating for federation endpoints.

mod activitypub_headers;

pub use activitypub_headers::require_activitypub_headers;
