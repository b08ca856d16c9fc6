//! Command dispatcher.
//!
//! Resolves a command's member path in the runtime's object graph and
//! performs the `call` or `set`. Methods run on their own task so that a
//! slow or panicking handler only affects its own command.

use remote_core::{CallbackEvent, Command, CommandKind, RemoteError, RequestContext};
use remote_runtime::{Invocation, Member, Reply, Runtime};
use tokio::sync::mpsc;
use tracing::debug;

/// How a command completed.
#[derive(Debug)]
pub enum Dispatch {
    /// Finished, optionally with a callback event.
    Done(Option<CallbackEvent>),
    /// A method is running with a callback handle; its callback events
    /// arrive on this channel.
    Pending(mpsc::Receiver<CallbackEvent>),
}

/// Executes `call` and `set` commands against a runtime.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    callback_capacity: usize,
}

impl CommandDispatcher {
    /// Create a dispatcher whose callback channels hold `callback_capacity`
    /// events.
    #[must_use]
    pub fn new(callback_capacity: usize) -> Self {
        Self {
            callback_capacity: callback_capacity.max(1),
        }
    }

    /// Execute `command` against `runtime`.
    ///
    /// `context` is handed to callback-enabled methods alongside their
    /// reply handle. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Lookup`], [`RemoteError::NotInvocable`] or
    /// [`RemoteError::NotAssignable`] when the path does not fit the
    /// command. The error concerns this command only.
    pub fn execute(
        &self,
        command: &Command,
        runtime: &dyn Runtime,
        context: Option<&RequestContext>,
    ) -> Result<Dispatch, RemoteError> {
        let path = command.path();
        let graph = runtime.graph();

        match command.cmd {
            CommandKind::Call => {
                let target = graph.resolve(path.segments())?;
                let Member::Method(method) = target.member else {
                    return Err(RemoteError::NotInvocable(path.to_string()));
                };

                let mut invocation = Invocation {
                    receiver: graph.receiver(target.parent),
                    args: command.call_args(),
                    reply: None,
                    context: None,
                };

                if command.callback {
                    let (tx, rx) = mpsc::channel(self.callback_capacity);
                    invocation.reply = Some(Reply::new(command.id.clone(), tx));
                    invocation.context = context.cloned();
                    debug!(path = %path, "calling method with callback");
                    tokio::spawn(async move { method(invocation) });
                    Ok(Dispatch::Pending(rx))
                } else {
                    debug!(path = %path, "calling method");
                    tokio::spawn(async move { method(invocation) });
                    Ok(Dispatch::Done(None))
                }
            }
            CommandKind::Set => {
                let Some(value) = command.args.clone() else {
                    return Ok(Dispatch::Done(None));
                };
                let target = graph.resolve(path.segments())?;
                graph.set(&target.path(), value)?;
                Ok(Dispatch::Done(
                    command
                        .callback
                        .then(|| CallbackEvent::new(command.id.clone(), Vec::new())),
                ))
            }
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}
