//! # remote_bridge
//!
//! Lets remote clients drive engine runtimes and follow their events over
//! HTTP long-polling.
//!
//! Request flow for commands:
//!
//! 1. [`PermissionGate`] resolves the runtime named by `objPath` and asks it
//!    for permission.
//! 2. [`CommandDispatcher`] performs the `call` or `set`.
//! 3. [`Bridge::process_commands`] gathers the callback events.
//!
//! Request flow for subscriptions:
//!
//! 1. Callback-less subscriptions are dropped; the rest go through the gate.
//! 2. [`EventAggregator`] pulls buffered events, or waits live, coalescing
//!    near-simultaneous events into one [`EventBatch`](remote_core::EventBatch).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use remote_bridge::{Bridge, BridgeConfig};
//! use remote_core::RequestContext;
//! use remote_runtime::{EngineRuntime, ObjectGraph, RuntimeRegistry};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(RuntimeRegistry::new());
//!     let graph = ObjectGraph::builder().property("score", json!(0)).build();
//!     registry.register(Arc::new(EngineRuntime::new("game", graph)));
//!
//!     let bridge = Bridge::new(registry, BridgeConfig::default());
//!     let commands = serde_json::from_value(json!([
//!         { "id": 1, "objPath": "game.score", "cmd": "set", "args": 10, "callback": true }
//!     ]))
//!     .unwrap();
//!     let callbacks = bridge.process_commands(commands, &RequestContext::new()).await;
//!     assert_eq!(callbacks.len(), 1);
//! }
//! ```

pub mod aggregator;
pub mod batch;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod gate;

pub use aggregator::{AcceptedSubscription, EventAggregator, ListenerSet, PollOutcome, SessionState};
pub use batch::BatchBuilder;
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use dispatcher::{CommandDispatcher, Dispatch};
pub use gate::{Admitted, PermissionGate};
