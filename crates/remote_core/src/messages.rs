//! Message types exchanged with remote clients.
//!
//! Field names follow the wire format (`objPath`, `type`); everything else
//! is plain serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cursor::Cursor;
use crate::path::ObjPath;

// ── Requests ────────────────────────────────────────────────────────────────

/// Operation performed by a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Invoke the method at `objPath`.
    Call,
    /// Assign `args` to the property at `objPath`.
    Set,
}

/// A remote invocation against a runtime's object graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Client-chosen identifier echoed back in callback events.
    #[serde(default)]
    pub id: Value,
    /// `engine.member.path` of the target.
    #[serde(rename = "objPath")]
    pub obj_path: String,
    /// `call` or `set`.
    pub cmd: CommandKind,
    /// Call arguments, or the value to assign.
    #[serde(default)]
    pub args: Option<Value>,
    /// Whether the client wants a callback event.
    #[serde(default)]
    pub callback: bool,
}

impl Command {
    /// The parsed object path.
    #[must_use]
    pub fn path(&self) -> ObjPath {
        ObjPath::parse(&self.obj_path)
    }

    /// Positional arguments for a `call`.
    ///
    /// An array is spread, `null` is no arguments and anything else is a
    /// single argument.
    #[must_use]
    pub fn call_args(&self) -> Vec<Value> {
        match &self.args {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// A request to receive events named `event` from the runtime in `objPath`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Client-chosen identifier; events are grouped under it.
    #[serde(default)]
    pub id: Value,
    /// `engine[.member...]`; only the engine segment is used for routing.
    #[serde(rename = "objPath", default)]
    pub obj_path: String,
    /// Event name to listen for.
    #[serde(default)]
    pub event: String,
    /// Subscriptions without a callback have no delivery channel.
    #[serde(default)]
    pub callback: bool,
}

impl Subscription {
    /// The parsed object path.
    #[must_use]
    pub fn path(&self) -> ObjPath {
        ObjPath::parse(&self.obj_path)
    }

    /// Key used to group events into one wrapper per subscription id.
    #[must_use]
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

// ── Responses ───────────────────────────────────────────────────────────────

/// Discriminator carried in the `type` field of outgoing payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// A [`CallbackEvent`].
    Callback,
    /// An [`EventWrapper`].
    Events,
}

/// An event produced by a runtime's event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    /// Event name.
    pub name: String,
    /// When the event was recorded.
    pub ts: Cursor,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

/// Arguments delivered by a method's callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// The originating command's id.
    pub id: Value,
    /// Always [`PayloadKind::Callback`].
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    /// Delivered arguments.
    pub args: Vec<Value>,
}

impl CallbackEvent {
    /// Package callback arguments for the command with `id`.
    #[must_use]
    pub fn new(id: Value, args: Vec<Value>) -> Self {
        Self {
            id,
            kind: PayloadKind::Callback,
            args,
        }
    }
}

/// All events for one subscription within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWrapper {
    /// The subscription's id.
    pub id: Value,
    /// Always [`PayloadKind::Events`].
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    /// Events in arrival order.
    pub events: Vec<RuntimeEvent>,
}

impl EventWrapper {
    /// Create an empty wrapper for subscription `id`.
    #[must_use]
    pub fn new(id: Value) -> Self {
        Self {
            id,
            kind: PayloadKind::Events,
            events: Vec::new(),
        }
    }
}

/// The body of a long-poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Cursor the client should send with its next poll.
    pub ts: Cursor,
    /// One wrapper per subscription that produced events.
    pub events: Vec<EventWrapper>,
}

impl EventBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn empty(ts: Cursor) -> Self {
        Self {
            ts,
            events: Vec::new(),
        }
    }

    /// Returns `true` if no subscription produced events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
