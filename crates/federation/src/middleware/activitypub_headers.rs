//! Reject requests that do not speak ActivityPub.

use axum::{
    body::Body,
    http::{
        HeaderMap, Request, StatusCode,
        header::{ACCEPT, CONTENT_TYPE, HeaderName},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

const LD_JSON: &str = "application/ld+json";
const ACTIVITY_JSON: &str = "application/activity+json";

fn any_header_contains(headers: &HeaderMap, name: &HeaderName, needles: &[&str]) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| needles.iter().any(|needle| value.contains(needle)))
}

/// Pass requests that accept JSON-LD or send an ActivityPub body.
///
/// Anything else is answered with an empty 415.
pub async fn require_activitypub_headers(req: Request<Body>, next: Next) -> Response {
    let headers = req.headers();
    let accepted = any_header_contains(headers, &ACCEPT, &[LD_JSON])
        || any_header_contains(headers, &CONTENT_TYPE, &[ACTIVITY_JSON, LD_JSON]);

    if !accepted {
        debug!(uri = %req.uri(), "Rejected request without ActivityPub headers");
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }

    next.run(req).await
}
