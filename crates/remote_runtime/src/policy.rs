//! Permission policies for [`EngineRuntime`](crate::EngineRuntime).
//!
//! A policy answers "may this request touch the runtime?" asynchronously. A
//! `false` answer is a silent veto; the bridge drops the item and moves on.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use remote_core::RequestContext;

type CheckFn = dyn Fn(&RequestContext) -> BoxFuture<'static, bool> + Send + Sync;

/// An asynchronous permission predicate.
#[derive(Clone)]
pub struct PermissionPolicy {
    check: Arc<CheckFn>,
}

impl PermissionPolicy {
    /// Admit every request.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::from_fn(|_| true)
    }

    /// Veto every request.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::from_fn(|_| false)
    }

    /// Build a policy from a synchronous predicate.
    #[must_use]
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(move |ctx| future::ready(predicate(ctx)).boxed()),
        }
    }

    /// Build a policy from an asynchronous predicate.
    #[must_use]
    pub fn from_async<F>(predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(predicate),
        }
    }

    /// Evaluate the policy for `ctx`.
    pub fn check(&self, ctx: &RequestContext) -> BoxFuture<'static, bool> {
        (self.check)(ctx)
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl fmt::Debug for PermissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PermissionPolicy(..)")
    }
}
