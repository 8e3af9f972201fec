//! Authorization Service
//!
//! The decision engine. Every check follows the same steps:
//!
//! ```text
//! resolve policy → before hook ─ Some(result) ──────────→ result
//!                       └─ None → can<Action> handler ──→ result
//! ```
//!
//! Scope application runs the analogous `before_scope` hook and then the
//! `scope<Action>` handler, returning whatever the handler produced.

use crate::error::{AuthzError, Result};
use crate::identity::Identity;
use crate::policy::CallArgs;
use crate::resolver::PolicyResolver;
use crate::resource::Resource;
use crate::result::PolicyResult;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Request-scoped authorization service.
///
/// Create one per request. The resolver is usually shared, the `checked`
/// flag is not: it records whether this request ran any authorization
/// decision so the request boundary can fail closed when none happened.
pub struct AuthorizationService {
    resolver: Arc<dyn PolicyResolver>,
    checked: AtomicBool,
}

impl AuthorizationService {
    pub fn new(resolver: Arc<dyn PolicyResolver>) -> Self {
        Self {
            resolver,
            checked: AtomicBool::new(false),
        }
    }

    /// Check whether `identity` may perform `action` on `resource`.
    pub fn can(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: &dyn Resource,
    ) -> Result<bool> {
        self.can_with(identity, action, resource, &CallArgs::default())
    }

    /// [`can`](Self::can) with extra handler arguments.
    pub fn can_with(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: &dyn Resource,
        args: &CallArgs,
    ) -> Result<bool> {
        Ok(self.can_result_with(identity, action, resource, args)?.status())
    }

    /// Check returning the full [`PolicyResult`], including any reason.
    pub fn can_result(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: &dyn Resource,
    ) -> Result<PolicyResult> {
        self.can_result_with(identity, action, resource, &CallArgs::default())
    }

    /// [`can_result`](Self::can_result) with extra handler arguments.
    pub fn can_result_with(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: &dyn Resource,
        args: &CallArgs,
    ) -> Result<PolicyResult> {
        // The attempt counts, even when resolution or the handler fails.
        self.checked.store(true, Ordering::SeqCst);

        let policy = self.resolver.get_policy(resource)?;

        if let Some(result) = policy.before(identity, resource, action) {
            debug!(policy = policy.name(), action, status = result.status(), "Before hook decided");
            return Ok(result);
        }

        let result = policy.call_can(action, identity, resource, args)?;
        debug!(policy = policy.name(), action, status = result.status(), "Policy check");
        Ok(result)
    }

    /// Run `can_result` and turn a denial into [`AuthzError::Forbidden`].
    pub fn authorize(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: &dyn Resource,
    ) -> Result<PolicyResult> {
        let result = self.can_result(identity, action, resource)?;
        if result.status() {
            Ok(result)
        } else {
            Err(AuthzError::Forbidden {
                action: action.to_string(),
                resource: resource.type_path().to_string(),
                result,
            })
        }
    }

    /// Apply the `scope<Action>` handler to `resource`.
    pub fn apply_scope<R: Resource>(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: R,
    ) -> Result<R> {
        self.apply_scope_with(identity, action, resource, &CallArgs::default())
    }

    /// [`apply_scope`](Self::apply_scope) with extra handler arguments.
    pub fn apply_scope_with<R: Resource>(
        &self,
        identity: Option<&Identity>,
        action: &str,
        resource: R,
        args: &CallArgs,
    ) -> Result<R> {
        self.checked.store(true, Ordering::SeqCst);

        let policy = self.resolver.get_policy(&resource)?;

        let resource = match policy.before_scope(identity, resource, action) {
            ControlFlow::Break(value) => {
                debug!(policy = policy.name(), action, "Before scope hook decided");
                return Ok(value);
            }
            ControlFlow::Continue(resource) => resource,
        };

        debug!(policy = policy.name(), action, "Applying scope");
        policy.call_scope(action, identity, resource, args)
    }

    /// Whether any check ran, or was skipped explicitly, on this service.
    pub fn authorization_checked(&self) -> bool {
        self.checked.load(Ordering::SeqCst)
    }

    /// Mark the request as checked without running a policy.
    pub fn skip_authorization(&self) -> &Self {
        self.checked.store(true, Ordering::SeqCst);
        self
    }

    pub fn resolver(&self) -> &Arc<dyn PolicyResolver> {
        &self.resolver
    }
}

impl fmt::Debug for AuthorizationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationService")
            .field("checked", &self.authorization_checked())
            .finish_non_exhaustive()
    }
}
