//! Batch assembly.
//!
//! Groups events into one [`EventWrapper`] per subscription id, in the
//! order subscriptions first produced an event.

use std::collections::HashMap;

use remote_core::{Cursor, EventBatch, EventWrapper, RuntimeEvent, Subscription};

/// Accumulates the events of one long-poll response.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    wrappers: Vec<EventWrapper>,
    index: HashMap<String, usize>,
    last_ts: Option<Cursor>,
}

impl BatchBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event for `subscription`.
    pub fn push(&mut self, subscription: &Subscription, event: RuntimeEvent) {
        self.last_ts = Some(self.last_ts.map_or(event.ts, |ts| ts.max(event.ts)));
        self.wrapper(subscription).events.push(event);
    }

    /// Append several events for `subscription`. Empty input adds nothing.
    pub fn extend(&mut self, subscription: &Subscription, events: Vec<RuntimeEvent>) {
        for event in events {
            self.push(subscription, event);
        }
    }

    /// Returns `true` if no event has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }

    /// Timestamp of the newest event added so far.
    #[must_use]
    pub fn last_ts(&self) -> Option<Cursor> {
        self.last_ts
    }

    /// Finish the batch with cursor `ts`.
    #[must_use]
    pub fn finish(self, ts: Cursor) -> EventBatch {
        EventBatch {
            ts,
            events: self.wrappers,
        }
    }

    fn wrapper(&mut self, subscription: &Subscription) -> &mut EventWrapper {
        let key = subscription.key();
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.wrappers.push(EventWrapper::new(subscription.id.clone()));
                let idx = self.wrappers.len() - 1;
                self.index.insert(key, idx);
                idx
            }
        };
        &mut self.wrappers[idx]
    }
}
