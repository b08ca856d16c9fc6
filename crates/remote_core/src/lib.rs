//! # remote_core
//!
//! Shared vocabulary for the engine remote bridge.
//!
//! This crate provides:
//!
//! - [`messages`]: Commands, subscriptions and the payloads sent back.
//! - [`cursor`]: Epoch-millisecond event cursors.
//! - [`path`]: Dotted `objPath` parsing.
//! - [`context`]: Per-request execution context.
//! - [`codec`]: JSON helpers for the endpoint form fields.
//! - [`error`]: The bridge error taxonomy.

pub mod codec;
pub mod context;
pub mod cursor;
pub mod error;
pub mod messages;
pub mod path;

pub use codec::decode_list;
pub use context::RequestContext;
pub use cursor::Cursor;
pub use error::RemoteError;
pub use messages::{
    CallbackEvent, Command, CommandKind, EventBatch, EventWrapper, PayloadKind, RuntimeEvent,
    Subscription,
};
pub use path::ObjPath;
