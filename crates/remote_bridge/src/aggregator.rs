//! Long-poll event aggregation.
//!
//! Each poll request runs one [`Session`] through this state machine:
//!
//! ```text
//! Fetching ──(buffered events)──► ImmediateFlush ──► Flushed
//!    │
//!    └──(nothing buffered)──► LiveWaiting ──(first event)──► LingerArmed ──(linger)──► Flushed
//!                                  │
//!                                  └──(poll timeout)──► TimeoutFlush
//!
//! any non-terminal state ──(disconnect / drop)──► Cancelled
//! ```
//!
//! The linger timer is armed once per batch by the first live event; later
//! events only append. Listeners registered for the live wait are removed
//! exactly once, on flush, timeout or cancellation, including when the
//! session future is dropped mid-wait.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use remote_core::{Cursor, EventBatch, RemoteError, RequestContext, Subscription};
use remote_runtime::{LiveEvent, Listener, ListenerToken, Runtime};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::{self, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::batch::BatchBuilder;
use crate::config::BridgeConfig;
use crate::gate::PermissionGate;

/// Lifecycle state of a long-poll session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Pulling buffered events newer than the cursor.
    Fetching,
    /// Buffered events were found and are being sent.
    ImmediateFlush,
    /// Listeners are registered; no event has arrived yet.
    LiveWaiting,
    /// At least one live event arrived; the linger timer is running.
    LingerArmed,
    /// A batch was sent.
    Flushed,
    /// The poll timeout elapsed and a heartbeat batch was sent.
    TimeoutFlush,
    /// The client went away; nothing was sent.
    Cancelled,
}

impl SessionState {
    /// Returns `true` for states that end a session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Flushed | Self::TimeoutFlush | Self::Cancelled)
    }
}

/// The single terminal result of a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Buffered events were available; no live wait happened.
    Immediate(EventBatch),
    /// Live events were coalesced and flushed after the linger window.
    Flushed(EventBatch),
    /// Nothing happened before the poll timeout.
    TimedOut(EventBatch),
    /// The client disconnected; no response must be sent.
    Cancelled,
}

impl PollOutcome {
    /// The batch to send, if any.
    #[must_use]
    pub fn batch(&self) -> Option<&EventBatch> {
        match self {
            Self::Immediate(batch) | Self::Flushed(batch) | Self::TimedOut(batch) => Some(batch),
            Self::Cancelled => None,
        }
    }

    /// Consume the outcome, returning the batch to send, if any.
    #[must_use]
    pub fn into_batch(self) -> Option<EventBatch> {
        match self {
            Self::Immediate(batch) | Self::Flushed(batch) | Self::TimedOut(batch) => Some(batch),
            Self::Cancelled => None,
        }
    }
}

/// A subscription that passed the permission gate for one poll.
#[derive(Clone)]
pub struct AcceptedSubscription {
    /// The client's subscription.
    pub subscription: Subscription,
    /// The runtime serving it.
    pub runtime: Arc<dyn Runtime>,
}

/// Live listeners registered by one session.
///
/// Clearing is idempotent and also happens on drop, so every listener is
/// removed exactly once whatever way the session ends.
#[derive(Default)]
pub struct ListenerSet {
    registered: Vec<(Arc<dyn Runtime>, ListenerToken)>,
}

impl ListenerSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `event` on `runtime` and remember the token.
    pub fn register(&mut self, runtime: &Arc<dyn Runtime>, event: &str, listener: Listener) {
        let token = runtime.subscribe(event, listener);
        self.registered.push((Arc::clone(runtime), token));
    }

    /// Remove every registered listener. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.registered.len();
        for (runtime, token) in self.registered.drain(..) {
            runtime.unsubscribe(token);
        }
        count
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl Drop for ListenerSet {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Owns long-poll sessions: admission, the session limit and the state
/// machine.
pub struct EventAggregator {
    gate: PermissionGate,
    config: BridgeConfig,
    sessions: Arc<Semaphore>,
}

impl EventAggregator {
    /// Create an aggregator admitting subscriptions through `gate`.
    #[must_use]
    pub fn new(gate: PermissionGate, config: BridgeConfig) -> Self {
        let sessions = Arc::new(Semaphore::new(config.max_sessions));
        Self {
            gate,
            config,
            sessions,
        }
    }

    /// Returns the number of sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.config
            .max_sessions
            .saturating_sub(self.sessions.available_permits())
    }

    /// Filter and permission-check `subscriptions`.
    ///
    /// Subscriptions without `callback` are dropped before any runtime is
    /// consulted. Checks run concurrently; the result is in completion
    /// order.
    pub async fn accept(
        &self,
        subscriptions: Vec<Subscription>,
        ctx: &RequestContext,
    ) -> Vec<AcceptedSubscription> {
        let mut wanted: Vec<Subscription> = subscriptions
            .into_iter()
            .filter(|s| {
                if !s.callback {
                    debug!(id = %s.id, "subscription without callback dropped");
                }
                s.callback
            })
            .collect();

        if wanted.len() > self.config.max_subscriptions {
            warn!(
                requested = wanted.len(),
                max = self.config.max_subscriptions,
                request_id = %ctx.request_id,
                "dropping subscriptions over limit"
            );
            wanted.truncate(self.config.max_subscriptions);
        }

        let mut checks: FuturesUnordered<_> = wanted
            .into_iter()
            .map(|subscription| async move {
                let admitted = self.gate.admit(subscription.path(), ctx).await;
                (subscription, admitted)
            })
            .collect();

        let mut accepted = Vec::new();
        while let Some((subscription, admitted)) = checks.next().await {
            match admitted {
                Ok(admitted) => accepted.push(AcceptedSubscription {
                    subscription,
                    runtime: admitted.runtime,
                }),
                Err(e) => debug!(id = %subscription.id, error = %e, "subscription dropped"),
            }
        }
        accepted
    }

    /// Run one long poll.
    ///
    /// Resolves once with the outcome. If `disconnect` completes first the
    /// outcome is [`PollOutcome::Cancelled`]; dropping the returned future
    /// has the same effect on listeners.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::SessionLimit`] if `max_sessions` polls are
    /// already open.
    pub async fn poll<D>(
        &self,
        cursor: Cursor,
        subscriptions: Vec<Subscription>,
        ctx: &RequestContext,
        disconnect: D,
    ) -> Result<PollOutcome, RemoteError>
    where
        D: Future<Output = ()>,
    {
        let Ok(_permit) = Arc::clone(&self.sessions).try_acquire_owned() else {
            warn!(max = self.config.max_sessions, "session limit reached");
            return Err(RemoteError::SessionLimit {
                max: self.config.max_sessions,
            });
        };

        let arrived = Cursor::issue();
        let mut session = Session::new(ctx.request_id, &self.config);
        tokio::pin!(disconnect);

        let accepted = tokio::select! {
            biased;
            () = &mut disconnect => None,
            accepted = self.accept(subscriptions, ctx) => Some(accepted),
        };
        let Some(accepted) = accepted else {
            return Ok(session.cancel());
        };
        session.accepted = accepted;

        Ok(session.run(cursor, arrived, disconnect).await)
    }
}

enum Wake {
    Disconnected,
    Linger,
    Deadline,
    Event(LiveEvent),
}

struct Session {
    id: Uuid,
    state: SessionState,
    linger: Duration,
    poll_timeout: Duration,
    listener_capacity: usize,
    accepted: Vec<AcceptedSubscription>,
    listeners: ListenerSet,
    batch: BatchBuilder,
}

impl Session {
    fn new(id: Uuid, config: &BridgeConfig) -> Self {
        Self {
            id,
            state: SessionState::Fetching,
            linger: config.linger,
            poll_timeout: config.poll_timeout,
            listener_capacity: config.listener_capacity.max(1),
            accepted: Vec::new(),
            listeners: ListenerSet::new(),
            batch: BatchBuilder::new(),
        }
    }

    async fn run<D>(mut self, since: Cursor, arrived: Cursor, mut disconnect: Pin<&mut D>) -> PollOutcome
    where
        D: Future<Output = ()>,
    {
        // Listeners go in before the pull; an event emitted during the pull
        // then arrives live if the pull came back empty.
        let (tx, mut rx) = mpsc::channel(self.listener_capacity);
        for (slot, accepted) in self.accepted.iter().enumerate() {
            self.listeners.register(
                &accepted.runtime,
                &accepted.subscription.event,
                Listener::new(slot, tx.clone()),
            );
        }
        drop(tx);

        debug!(
            session = %self.id,
            subscriptions = self.accepted.len(),
            since = %since,
            "fetching buffered events"
        );
        let fetched = tokio::select! {
            biased;
            () = &mut disconnect => false,
            () = self.fetch(since) => true,
        };
        if !fetched {
            return self.cancel();
        }

        if !self.batch.is_empty() {
            self.listeners.clear();
            self.transition(SessionState::ImmediateFlush);
            let batch = mem::take(&mut self.batch).finish(arrived);
            self.transition(SessionState::Flushed);
            debug!(session = %self.id, wrappers = batch.events.len(), "flushed buffered events");
            return PollOutcome::Immediate(batch);
        }

        self.transition(SessionState::LiveWaiting);

        let deadline = time::sleep(self.poll_timeout);
        let linger = time::sleep(self.poll_timeout);
        tokio::pin!(deadline, linger);

        loop {
            let waiting = self.state == SessionState::LiveWaiting;
            let armed = self.state == SessionState::LingerArmed;

            let wake = tokio::select! {
                biased;
                () = &mut disconnect => Wake::Disconnected,
                () = &mut linger, if armed => Wake::Linger,
                () = &mut deadline, if waiting => Wake::Deadline,
                Some(live) = rx.recv() => Wake::Event(live),
            };

            match wake {
                Wake::Disconnected => return self.cancel(),
                Wake::Linger => {
                    let batch = self.flush(&mut rx, SessionState::Flushed);
                    debug!(session = %self.id, wrappers = batch.events.len(), ts = %batch.ts, "flushed live events");
                    return PollOutcome::Flushed(batch);
                }
                Wake::Deadline => {
                    let batch = self.flush(&mut rx, SessionState::TimeoutFlush);
                    debug!(session = %self.id, wrappers = batch.events.len(), ts = %batch.ts, "poll timed out");
                    return PollOutcome::TimedOut(batch);
                }
                Wake::Event(live) => {
                    self.absorb(live);
                    if waiting {
                        linger.as_mut().reset(Instant::now() + self.linger);
                        self.transition(SessionState::LingerArmed);
                    }
                }
            }
        }
    }

    /// End the live wait and build the batch to send.
    ///
    /// The cursor is issued before the listeners go, so any event they
    /// missed is stamped above it. Events already queued on `rx` are
    /// appended. The batch cursor is the newest appended event's `ts`,
    /// capped by that issued cursor.
    fn flush(&mut self, rx: &mut mpsc::Receiver<LiveEvent>, state: SessionState) -> EventBatch {
        let issued = Cursor::issue();
        self.listeners.clear();
        while let Ok(live) = rx.try_recv() {
            self.absorb(live);
        }
        self.transition(state);
        let ts = self.batch.last_ts().map_or(issued, |last| last.min(issued));
        mem::take(&mut self.batch).finish(ts)
    }

    fn absorb(&mut self, live: LiveEvent) {
        if let Some(accepted) = self.accepted.get(live.slot) {
            self.batch.push(&accepted.subscription, live.event);
        }
    }

    async fn fetch(&mut self, since: Cursor) {
        let mut pulls: FuturesUnordered<_> = self
            .accepted
            .iter()
            .enumerate()
            .map(|(slot, accepted)| async move {
                let result = accepted
                    .runtime
                    .pull_events(&accepted.subscription.event, since)
                    .await;
                (slot, result)
            })
            .collect();

        while let Some((slot, result)) = pulls.next().await {
            match result {
                Ok(events) => self.batch.extend(&self.accepted[slot].subscription, events),
                Err(e) => debug!(session = %self.id, slot, error = %e, "historical pull failed"),
            }
        }
    }

    fn cancel(mut self) -> PollOutcome {
        let removed = self.listeners.clear();
        self.transition(SessionState::Cancelled);
        debug!(session = %self.id, removed, "session cancelled");
        PollOutcome::Cancelled
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.listeners.clear();
            self.transition(SessionState::Cancelled);
        }
    }
}
