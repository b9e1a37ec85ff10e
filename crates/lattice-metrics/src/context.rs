//! Request-scoped observation context.
//!
//! Carries the identity of the request currently being processed
//! (deployment, replica, route) so that metrics recorded anywhere in the
//! call chain pick up the right labels without explicit threading. The
//! context is stored in a tokio task-local: each logical task sees its
//! own context across `.await` points, scopes nest with stack discipline,
//! and nothing is ever written to a process-global slot.
//!
//! For a nested remote call, the caller captures [`current`] and attaches
//! the encoded context to the outgoing request; the destination wraps the
//! call's execution in [`scope`] with the decoded context.

use serde::{Deserialize, Serialize};
use tokio::task::futures::TaskLocalFuture;

tokio::task_local! {
    static CURRENT: ObservationContext;
}

/// Identity of the request being processed, propagated implicitly
/// through the asynchronous call chain.
///
/// All fields are optional: metrics recorded outside any request scope
/// simply carry none of these labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl ObservationContext {
    /// An empty context with no identifying attributes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn with_replica(mut self, replica: impl Into<String>) -> Self {
        self.replica = Some(replica.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// True if no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.deployment.is_none() && self.replica.is_none() && self.route.is_none()
    }

    /// Serialize for attachment to an outgoing remote call.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a context received alongside an incoming call.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Run `fut` with `ctx` as the active observation context.
///
/// The context stays active across suspension points inside `fut` and is
/// restored to the enclosing one (if any) when `fut` completes. Scopes
/// nest: an inner [`scope`] shadows the outer context for its duration.
pub fn scope<F>(ctx: ObservationContext, fut: F) -> TaskLocalFuture<ObservationContext, F>
where
    F: Future,
{
    CURRENT.scope(ctx, fut)
}

/// Synchronous variant of [`scope`] for non-async call sites.
pub fn sync_scope<F, R>(ctx: ObservationContext, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT.sync_scope(ctx, f)
}

/// The active context, or an empty context when called outside any scope.
pub fn current() -> ObservationContext {
    CURRENT.try_with(|ctx| ctx.clone()).unwrap_or_default()
}
