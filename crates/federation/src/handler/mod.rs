//! `ActivityPub` request handlers.

#![allow(missing_docs)]

mod actor;
mod inbox;

pub use actor::{ACTOR_CONTENT_TYPE, ActorDocument, ActorPublicKey, ActorState, actor_handler};
pub use inbox::{DEFAULT_MAX_BODY_BYTES, InboxState, inbox_handler};
