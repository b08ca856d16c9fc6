//! Runtime registry. Resolves engine names to runtimes.
//!
//! The bridge looks every command and subscription up here by the first
//! segment of its `objPath`. A missing entry is not an error; callers drop
//! the item silently.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::runtime::Runtime;

/// Registry of all runtimes known to the bridge, keyed by engine name.
#[derive(Default)]
pub struct RuntimeRegistry {
    runtimes: DashMap<String, Arc<dyn Runtime>>,
}

impl RuntimeRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runtimes: DashMap::new(),
        }
    }

    /// Register a runtime under its own name, replacing any runtime that was
    /// registered under the same name.
    ///
    /// Returns the replaced runtime, if any.
    pub fn register(&self, runtime: Arc<dyn Runtime>) -> Option<Arc<dyn Runtime>> {
        let name = runtime.name().to_string();
        info!(engine = %name, "registering runtime");
        self.runtimes.insert(name, runtime)
    }

    /// Remove a runtime by name.
    ///
    /// Returns `true` if the runtime was found and removed.
    pub fn unregister(&self, name: &str) -> bool {
        self.runtimes.remove(name).is_some()
    }

    /// Look up a runtime by engine name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Runtime>> {
        self.runtimes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the registered engine names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runtimes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns the number of registered runtimes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    /// Returns `true` if no runtime is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }
}
