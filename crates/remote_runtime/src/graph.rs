//! The typed capability table of a runtime.
//!
//! A runtime declares its reachable members once, when it is built:
//! objects (namespaces), properties (assignable JSON values) and methods
//! (invocable handlers). Remote commands resolve dotted member paths against
//! this table instead of walking arbitrary objects.
//!
//! ```text
//! player            object
//! player.score      property  = 0
//! player.reset      method
//! ```
//!
//! Intermediate path segments must resolve to objects. Property values live
//! in a concurrent map so that `set` and method receivers can update them
//! without locking the whole graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use remote_core::{CallbackEvent, RemoteError, RequestContext};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Handler invoked for a `call` command.
pub type MethodFn = Arc<dyn Fn(Invocation) + Send + Sync>;

/// A declared member of the graph.
#[derive(Clone)]
pub enum Member {
    /// A namespace containing other members.
    Object,
    /// An assignable value.
    Property,
    /// An invocable handler.
    Method(MethodFn),
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("Object"),
            Self::Property => f.write_str("Property"),
            Self::Method(_) => f.write_str("Method(..)"),
        }
    }
}

/// A resolved member together with its parent object.
#[derive(Debug, Clone)]
pub struct Target {
    /// Dotted path of the parent object (`""` for the root).
    pub parent: String,
    /// Final path segment.
    pub key: String,
    /// The member found at `parent.key`.
    pub member: Member,
}

impl Target {
    /// Full dotted path of the member.
    #[must_use]
    pub fn path(&self) -> String {
        join(&self.parent, &self.key)
    }
}

struct GraphInner {
    members: HashMap<String, Member>,
    values: DashMap<String, Value>,
}

/// A runtime's navigable object graph. Cheap to clone.
#[derive(Clone)]
pub struct ObjectGraph {
    inner: Arc<GraphInner>,
}

impl fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("members", &self.inner.members.len())
            .finish()
    }
}

impl ObjectGraph {
    /// Start declaring a graph.
    #[must_use]
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Resolve member `segments` (the `objPath` without its engine name).
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Lookup`] naming the first segment that is
    /// absent, or that is not an object while more segments follow.
    pub fn resolve(&self, segments: &[String]) -> Result<Target, RemoteError> {
        let path = segments.join(".");
        let Some((key, parents)) = segments.split_last() else {
            return Err(RemoteError::Lookup {
                path,
                segment: String::new(),
            });
        };

        let mut parent = String::new();
        for segment in parents {
            let next = join(&parent, segment);
            match self.inner.members.get(&next) {
                Some(Member::Object) => parent = next,
                _ => {
                    return Err(RemoteError::Lookup {
                        path,
                        segment: segment.clone(),
                    });
                }
            }
        }

        let member = self
            .inner
            .members
            .get(&join(&parent, key))
            .cloned()
            .ok_or_else(|| RemoteError::Lookup {
                path: path.clone(),
                segment: key.clone(),
            })?;

        Ok(Target {
            parent,
            key: key.clone(),
            member,
        })
    }

    /// Current value of the property at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.inner.values.get(path).map(|v| v.value().clone())
    }

    /// Assign the property at `path`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Lookup`] if nothing is declared at `path` and
    /// [`RemoteError::NotAssignable`] if the member is not a property.
    pub fn set(&self, path: &str, value: Value) -> Result<Value, RemoteError> {
        match self.inner.members.get(path) {
            Some(Member::Property) => {
                debug!(path, "property assigned");
                Ok(self
                    .inner
                    .values
                    .insert(path.to_string(), value)
                    .unwrap_or(Value::Null))
            }
            Some(_) => Err(RemoteError::NotAssignable(path.to_string())),
            None => Err(RemoteError::Lookup {
                path: path.to_string(),
                segment: path.rsplit('.').next().unwrap_or(path).to_string(),
            }),
        }
    }

    /// A receiver bound to the object at `path`.
    #[must_use]
    pub fn receiver(&self, path: impl Into<String>) -> Receiver {
        Receiver {
            graph: self.clone(),
            path: path.into(),
        }
    }

    /// Returns the number of declared members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }
}

/// Declares the members of an [`ObjectGraph`].
///
/// Declaring `a.b.c` implicitly declares `a` and `a.b` as objects.
#[derive(Default)]
pub struct GraphBuilder {
    members: HashMap<String, Member>,
    values: HashMap<String, Value>,
}

impl GraphBuilder {
    /// Declare an object (namespace).
    #[must_use]
    pub fn object(mut self, path: &str) -> Self {
        self.declare(path, Member::Object);
        self
    }

    /// Declare a property with its initial value.
    #[must_use]
    pub fn property(mut self, path: &str, initial: Value) -> Self {
        self.declare(path, Member::Property);
        self.values.insert(path.to_string(), initial);
        self
    }

    /// Declare a method.
    #[must_use]
    pub fn method<F>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Invocation) + Send + Sync + 'static,
    {
        self.declare(path, Member::Method(Arc::new(handler)));
        self
    }

    /// Finish the graph.
    #[must_use]
    pub fn build(self) -> ObjectGraph {
        ObjectGraph {
            inner: Arc::new(GraphInner {
                members: self.members,
                values: self.values.into_iter().collect(),
            }),
        }
    }

    fn declare(&mut self, path: &str, member: Member) {
        let mut prefix = String::new();
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            prefix = join(&prefix, segment);
            if segments.peek().is_some() {
                self.members
                    .entry(prefix.clone())
                    .or_insert(Member::Object);
            }
        }
        self.values.remove(path);
        self.members.insert(path.to_string(), member);
    }
}

/// The parent object a method is invoked on.
#[derive(Debug, Clone)]
pub struct Receiver {
    graph: ObjectGraph,
    path: String,
}

impl Receiver {
    /// Dotted path of the receiver object (`""` for the root).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read a property of the receiver.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.graph.get(&join(&self.path, key))
    }

    /// Assign a property of the receiver.
    ///
    /// # Errors
    ///
    /// See [`ObjectGraph::set`].
    pub fn set(&self, key: &str, value: Value) -> Result<Value, RemoteError> {
        self.graph.set(&join(&self.path, key), value)
    }
}

/// Delivery handle passed to methods called with `callback: true`.
///
/// Every [`send`](Reply::send) packages one callback event for the
/// originating command. The handle may be cloned, moved into tasks and used
/// any number of times; deliveries after the request finished are dropped.
#[derive(Debug, Clone)]
pub struct Reply {
    id: Value,
    tx: mpsc::Sender<CallbackEvent>,
}

impl Reply {
    /// Create a reply handle for command `id`.
    #[must_use]
    pub fn new(id: Value, tx: mpsc::Sender<CallbackEvent>) -> Self {
        Self { id, tx }
    }

    /// Deliver callback arguments.
    ///
    /// Returns `false` if the event could not be queued.
    pub fn send(&self, args: Vec<Value>) -> bool {
        match self.tx.try_send(CallbackEvent::new(self.id.clone(), args)) {
            Ok(()) => true,
            Err(e) => {
                debug!(id = %self.id, error = %e, "callback dropped");
                false
            }
        }
    }
}

/// Everything a method receives when it is called.
#[derive(Debug)]
pub struct Invocation {
    /// The method's parent object.
    pub receiver: Receiver,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Callback delivery, present when the command asked for one.
    pub reply: Option<Reply>,
    /// Request context, present alongside `reply` when the caller supplied it.
    pub context: Option<RequestContext>,
}

impl Invocation {
    /// Positional argument `index`, or `Null`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Null)
    }

    /// Deliver callback arguments if a callback was requested.
    pub fn respond(&self, args: Vec<Value>) {
        if let Some(reply) = &self.reply {
            reply.send(args);
        }
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
