//! The `demo` runtime served out of the box.
//!
//! ```text
//! demo
//! ├── counter
//! │   ├── value        property, starts at 0
//! │   ├── increment    method (step = 1) → new value
//! │   └── get          method → value
//! └── clock
//!     └── now          method → epoch milliseconds
//! ```
//!
//! A background task emits `tick` events carrying a running count.

use std::sync::Arc;
use std::time::Duration;

use remote_core::Cursor;
use remote_runtime::{EngineRuntime, ObjectGraph};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Engine name of the demo runtime.
pub const NAME: &str = "demo";

/// Event emitted periodically by [`spawn_ticker`].
pub const TICK_EVENT: &str = "tick";

/// Build the demo runtime.
pub fn runtime() -> Arc<EngineRuntime> {
    let graph = ObjectGraph::builder()
        .property("counter.value", json!(0))
        .method("counter.increment", |call| {
            let step = call.arg(0).as_i64().unwrap_or(1);
            let current = call
                .receiver
                .get("value")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let next = current + step;
            if let Err(e) = call.receiver.set("value", json!(next)) {
                debug!(error = %e, "counter update failed");
                return;
            }
            call.respond(vec![json!(next)]);
        })
        .method("counter.get", |call| {
            let value = call.receiver.get("value").unwrap_or(Value::Null);
            call.respond(vec![value]);
        })
        .method("clock.now", |call| {
            call.respond(vec![json!(Cursor::now().as_millis())]);
        })
        .build();
    Arc::new(EngineRuntime::new(NAME, graph))
}

/// Emit a [`TICK_EVENT`] on `runtime` every `period`.
pub fn spawn_ticker(runtime: Arc<EngineRuntime>, period: Duration) -> JoinHandle<()> {
    info!(period_ms = period.as_millis() as u64, "demo ticker started");
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        let mut count: u64 = 0;
        loop {
            interval.tick().await;
            count += 1;
            runtime.emit(TICK_EVENT, json!({ "n": count }));
        }
    })
}
