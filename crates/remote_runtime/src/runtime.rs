//! The runtime contract.
//!
//! Everything the bridge needs from an engine runtime goes through the
//! object-safe [`Runtime`] trait so hosts can register their own
//! implementations next to [`EngineRuntime`](crate::EngineRuntime).

use std::fmt;

use futures::future::BoxFuture;
use remote_core::{Cursor, RemoteError, RequestContext, RuntimeEvent};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::graph::ObjectGraph;

/// Identifies one registered live listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(Uuid);

impl ListenerToken {
    /// Allocate a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live event tagged with the session slot it was registered for.
#[derive(Debug, Clone)]
pub struct LiveEvent {
    /// Index of the subscription inside its session.
    pub slot: usize,
    /// The event itself.
    pub event: RuntimeEvent,
}

/// The delivery end of a live subscription.
///
/// All listeners of one long-poll session share the same bounded channel;
/// `slot` tells the session which subscription an event belongs to.
#[derive(Debug, Clone)]
pub struct Listener {
    slot: usize,
    tx: mpsc::Sender<LiveEvent>,
}

impl Listener {
    /// Create a listener delivering into `tx` under `slot`.
    #[must_use]
    pub fn new(slot: usize, tx: mpsc::Sender<LiveEvent>) -> Self {
        Self { slot, tx }
    }

    /// Push an event without waiting.
    ///
    /// Returns `false` if the session's channel is full or closed; the event
    /// is dropped in that case.
    pub fn deliver(&self, event: RuntimeEvent) -> bool {
        let live = LiveEvent {
            slot: self.slot,
            event,
        };
        match self.tx.try_send(live) {
            Ok(()) => true,
            Err(TrySendError::Full(live)) => {
                warn!(
                    slot = self.slot,
                    event = %live.event.name,
                    "listener channel full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(slot = self.slot, "listener channel closed");
                false
            }
        }
    }
}

/// An engine runtime reachable through the bridge.
pub trait Runtime: Send + Sync {
    /// The engine name this runtime is registered under.
    fn name(&self) -> &str;

    /// Decide whether the request described by `ctx` may proceed.
    fn check_permission<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, bool>;

    /// The runtime's object graph.
    fn graph(&self) -> &ObjectGraph;

    /// Buffered events named `event` recorded strictly after `since`.
    fn pull_events<'a>(
        &'a self,
        event: &'a str,
        since: Cursor,
    ) -> BoxFuture<'a, Result<Vec<RuntimeEvent>, RemoteError>>;

    /// Register a live listener for events named `event`.
    fn subscribe(&self, event: &str, listener: Listener) -> ListenerToken;

    /// Remove a live listener.
    ///
    /// Returns `true` if the token was registered. Removing an unknown or
    /// already removed token is a no-op.
    fn unsubscribe(&self, token: ListenerToken) -> bool;
}
