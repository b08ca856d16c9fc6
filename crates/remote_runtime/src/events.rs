//! Event hub: a runtime's event store and live notifier.
//!
//! Every emitted event is appended to a bounded history (oldest evicted
//! first) and pushed to the live listeners registered for its name.
//! Timestamps come from [`Cursor::issue`], so they are strictly increasing
//! across every hub in the process.
//!
//! Stamping, recording and live delivery happen under one lock, and
//! unsubscribing takes the same lock. An event is therefore either delivered
//! to a listener or stamped after that listener was removed.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use remote_core::{Cursor, RuntimeEvent};
use serde_json::Value;
use tracing::{debug, trace};

use crate::runtime::{Listener, ListenerToken};

/// Default number of events retained for historical pulls.
pub const DEFAULT_HISTORY: usize = 1024;

#[derive(Debug)]
struct History {
    events: VecDeque<RuntimeEvent>,
    capacity: usize,
}

/// Event store plus live listener table.
#[derive(Debug)]
pub struct EventHub {
    history: Mutex<History>,
    listeners: DashMap<ListenerToken, (String, Listener)>,
}

impl EventHub {
    /// Create a hub retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            history: Mutex::new(History {
                events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY)),
                capacity,
            }),
            listeners: DashMap::new(),
        }
    }

    /// Record an event and notify live listeners.
    pub fn emit(&self, name: &str, data: Value) -> RuntimeEvent {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let event = RuntimeEvent {
            name: name.to_string(),
            ts: Cursor::issue(),
            data,
        };
        if history.capacity > 0 {
            if history.events.len() == history.capacity {
                history.events.pop_front();
            }
            history.events.push_back(event.clone());
        }

        let mut delivered = 0usize;
        for entry in self.listeners.iter() {
            let (topic, listener) = entry.value();
            if topic == name && listener.deliver(event.clone()) {
                delivered += 1;
            }
        }
        drop(history);

        trace!(event = name, ts = %event.ts, delivered, "event emitted");
        event
    }

    /// Buffered events named `name` recorded after `since`, oldest first.
    #[must_use]
    pub fn pull(&self, name: &str, since: Cursor) -> Vec<RuntimeEvent> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .events
            .iter()
            .filter(|e| e.name == name && e.ts > since)
            .cloned()
            .collect()
    }

    /// Register a live listener for events named `name`.
    pub fn subscribe(&self, name: &str, listener: Listener) -> ListenerToken {
        let token = ListenerToken::new();
        self.listeners.insert(token, (name.to_string(), listener));
        debug!(event = name, %token, "listener registered");
        token
    }

    /// Remove a live listener. Unknown tokens are ignored.
    pub fn unsubscribe(&self, token: ListenerToken) -> bool {
        let _history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.listeners.remove(&token).is_some();
        if removed {
            debug!(%token, "listener removed");
        }
        removed
    }

    /// Returns the number of registered live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    /// Returns `true` if no events are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
