//! Bridge facade over the two request pipelines a host exposes.
//!
//! - [`Bridge::process_commands`] runs a batch of commands concurrently and
//!   collects the callback events they produce.
//! - [`Bridge::poll_events`] runs one long poll.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use remote_core::{CallbackEvent, Command, Cursor, RemoteError, RequestContext, Subscription};
use remote_runtime::RuntimeRegistry;
use tokio::sync::mpsc;
use tokio::time;
use tracing::debug;

use crate::aggregator::{EventAggregator, PollOutcome};
use crate::config::BridgeConfig;
use crate::dispatcher::{CommandDispatcher, Dispatch};
use crate::gate::PermissionGate;

/// A finished command: its first callback, plus the channel further
/// callbacks may still arrive on.
type Completion = (Option<CallbackEvent>, Option<mpsc::Receiver<CallbackEvent>>);

/// Command and subscription pipelines over a runtime registry.
pub struct Bridge {
    registry: Arc<RuntimeRegistry>,
    config: BridgeConfig,
    gate: PermissionGate,
    dispatcher: CommandDispatcher,
    aggregator: EventAggregator,
}

impl Bridge {
    /// Create a bridge serving the runtimes in `registry`.
    #[must_use]
    pub fn new(registry: Arc<RuntimeRegistry>, config: BridgeConfig) -> Self {
        let gate = PermissionGate::new(Arc::clone(&registry));
        let dispatcher = CommandDispatcher::new(config.callback_capacity);
        let aggregator = EventAggregator::new(gate.clone(), config.clone());
        Self {
            registry,
            config,
            gate,
            dispatcher,
            aggregator,
        }
    }

    /// The runtime registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RuntimeRegistry> {
        &self.registry
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The long-poll aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &EventAggregator {
        &self.aggregator
    }

    /// Execute `commands` concurrently and collect their callback events.
    ///
    /// Events appear in completion order. Commands that fail (unknown
    /// runtime, veto, bad path) contribute nothing and never affect their
    /// siblings. A callback-enabled `call` completes on its first callback,
    /// or with nothing after `command_timeout`; callbacks it delivers before
    /// the whole batch completes are appended after the first ones.
    pub async fn process_commands(
        &self,
        commands: Vec<Command>,
        ctx: &RequestContext,
    ) -> Vec<CallbackEvent> {
        let count = commands.len();
        let mut running: FuturesUnordered<_> = commands
            .into_iter()
            .map(|command| self.run_command(command, ctx))
            .collect();

        let mut events = Vec::new();
        let mut open = Vec::new();
        while let Some((first, rest)) = running.next().await {
            events.extend(first);
            open.extend(rest);
        }
        for mut rx in open {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }

        debug!(
            request_id = %ctx.request_id,
            commands = count,
            callbacks = events.len(),
            "commands processed"
        );
        events
    }

    /// Run one long poll. See [`EventAggregator::poll`].
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::SessionLimit`] if too many polls are open.
    pub async fn poll_events<D>(
        &self,
        cursor: Cursor,
        subscriptions: Vec<Subscription>,
        ctx: &RequestContext,
        disconnect: D,
    ) -> Result<PollOutcome, RemoteError>
    where
        D: Future<Output = ()>,
    {
        self.aggregator
            .poll(cursor, subscriptions, ctx, disconnect)
            .await
    }

    async fn run_command(&self, command: Command, ctx: &RequestContext) -> Completion {
        let admitted = match self.gate.admit(command.path(), ctx).await {
            Ok(admitted) => admitted,
            Err(_) => return (None, None),
        };

        match self
            .dispatcher
            .execute(&command, admitted.runtime.as_ref(), Some(ctx))
        {
            Ok(Dispatch::Done(event)) => (event, None),
            Ok(Dispatch::Pending(mut rx)) => {
                match time::timeout(self.config.command_timeout, rx.recv()).await {
                    Ok(Some(event)) => (Some(event), Some(rx)),
                    Ok(None) => {
                        debug!(id = %command.id, "method finished without callback");
                        (None, None)
                    }
                    Err(_) => {
                        debug!(id = %command.id, "callback timed out");
                        (None, None)
                    }
                }
            }
            Err(e) => {
                debug!(id = %command.id, path = %command.obj_path, error = %e, "command dropped");
                (None, None)
            }
        }
    }
}
