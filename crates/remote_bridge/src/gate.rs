//! Permission gate.
//!
//! Resolves the runtime named by an `objPath` and asks it whether the
//! current request may proceed.

use std::sync::Arc;

use remote_core::{ObjPath, RemoteError, RequestContext};
use remote_runtime::{Runtime, RuntimeRegistry};
use tracing::debug;

/// A runtime that agreed to serve a request.
#[derive(Clone)]
pub struct Admitted {
    /// The resolved runtime.
    pub runtime: Arc<dyn Runtime>,
    /// The path that was admitted.
    pub path: ObjPath,
}

/// Runtime lookup plus per-runtime permission check.
#[derive(Clone)]
pub struct PermissionGate {
    registry: Arc<RuntimeRegistry>,
}

impl PermissionGate {
    /// Create a gate over `registry`.
    #[must_use]
    pub fn new(registry: Arc<RuntimeRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve and permission-check the runtime addressed by `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::UnknownRuntime`] or
    /// [`RemoteError::PermissionDenied`]; callers treat both as a silent
    /// drop.
    pub async fn admit(
        &self,
        path: ObjPath,
        ctx: &RequestContext,
    ) -> Result<Admitted, RemoteError> {
        let Some(runtime) = self.registry.resolve(path.engine()) else {
            debug!(
                engine = path.engine(),
                request_id = %ctx.request_id,
                "no such runtime"
            );
            return Err(RemoteError::UnknownRuntime(path.engine().to_string()));
        };

        if !runtime.check_permission(ctx).await {
            debug!(
                engine = path.engine(),
                request_id = %ctx.request_id,
                "permission denied"
            );
            return Err(RemoteError::PermissionDenied(path.engine().to_string()));
        }

        Ok(Admitted { runtime, path })
    }
}

#[cfg(test)]
mod tests {
    use remote_runtime::{EngineRuntime, ObjectGraph, PermissionPolicy};

    use super::*;

    fn make_gate() -> PermissionGate {
        let registry = Arc::new(RuntimeRegistry::new());
        registry.register(Arc::new(EngineRuntime::new(
            "open",
            ObjectGraph::builder().build(),
        )));
        registry.register(Arc::new(
            EngineRuntime::new("locked", ObjectGraph::builder().build())
                .with_policy(PermissionPolicy::deny_all()),
        ));
        PermissionGate::new(registry)
    }

    #[tokio::test]
    async fn test_admits_open_runtime() {
        let gate = make_gate();
        let admitted = gate
            .admit(ObjPath::parse("open.thing"), &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(admitted.runtime.name(), "open");
        assert_eq!(admitted.path.member_path(), "thing");
    }

    #[tokio::test]
    async fn test_unknown_runtime() {
        let gate = make_gate();
        let result = gate
            .admit(ObjPath::parse("missing.thing"), &RequestContext::new())
            .await;
        assert!(matches!(result, Err(RemoteError::UnknownRuntime(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_permission_veto() {
        let gate = make_gate();
        let result = gate
            .admit(ObjPath::parse("locked.thing"), &RequestContext::new())
            .await;
        assert!(matches!(result, Err(RemoteError::PermissionDenied(_))));
    }
}
