//! Reference runtime.
//!
//! [`EngineRuntime`] combines an [`ObjectGraph`], an [`EventHub`] and a
//! [`PermissionPolicy`] into a [`Runtime`] that can be registered with the
//! bridge as-is.

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use remote_core::{Cursor, RemoteError, RequestContext, RuntimeEvent};
use serde_json::Value;

use crate::events::EventHub;
use crate::graph::ObjectGraph;
use crate::policy::PermissionPolicy;
use crate::runtime::{Listener, ListenerToken, Runtime};

/// An in-process engine runtime.
#[derive(Debug)]
pub struct EngineRuntime {
    name: String,
    graph: ObjectGraph,
    events: EventHub,
    policy: PermissionPolicy,
}

impl EngineRuntime {
    /// Create a runtime that admits every request.
    #[must_use]
    pub fn new(name: impl Into<String>, graph: ObjectGraph) -> Self {
        Self {
            name: name.into(),
            graph,
            events: EventHub::default(),
            policy: PermissionPolicy::allow_all(),
        }
    }

    /// Replace the permission policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PermissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the event hub with one retaining `capacity` events.
    #[must_use]
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.events = EventHub::new(capacity);
        self
    }

    /// The runtime's event hub.
    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Shorthand for `self.events().emit(name, data)`.
    pub fn emit(&self, name: &str, data: Value) -> RuntimeEvent {
        self.events.emit(name, data)
    }
}

impl Runtime for EngineRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_permission<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, bool> {
        self.policy.check(ctx)
    }

    fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    fn pull_events<'a>(
        &'a self,
        event: &'a str,
        since: Cursor,
    ) -> BoxFuture<'a, Result<Vec<RuntimeEvent>, RemoteError>> {
        future::ready(Ok(self.events.pull(event, since))).boxed()
    }

    fn subscribe(&self, event: &str, listener: Listener) -> ListenerToken {
        self.events.subscribe(event, listener)
    }

    fn unsubscribe(&self, token: ListenerToken) -> bool {
        self.events.unsubscribe(token)
    }
}
