//! # remote_runtime
//!
//! Engine runtimes as seen by the remote bridge.
//!
//! This crate provides:
//!
//! - [`Runtime`]: the contract every runtime honours (permission check,
//!   object graph, historical pulls and live listeners).
//! - [`RuntimeRegistry`]: engine name → runtime resolution.
//! - [`ObjectGraph`]: the typed capability table remote paths resolve in.
//! - [`EventHub`]: bounded event store with live notification.
//! - [`PermissionPolicy`]: asynchronous permission predicates.
//! - [`EngineRuntime`]: a ready-made runtime built from the pieces above.

pub mod engine;
pub mod events;
pub mod graph;
pub mod policy;
pub mod registry;
pub mod runtime;

pub use engine::EngineRuntime;
pub use events::EventHub;
pub use graph::{GraphBuilder, Invocation, Member, MethodFn, ObjectGraph, Receiver, Reply, Target};
pub use policy::PermissionPolicy;
pub use registry::RuntimeRegistry;
pub use runtime::{LiveEvent, Listener, ListenerToken, Runtime};
