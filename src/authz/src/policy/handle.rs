//! Type-erased policy handle

use super::{can_method_name, scope_method_name, CallArgs, Policy, Rules};
use crate::error::{AuthzError, Result};
use crate::identity::Identity;
use crate::resource::{Resource, TypePath};
use crate::result::PolicyResult;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

pub(crate) type CanHandler =
    Box<dyn Fn(Option<&Identity>, &dyn Resource, &CallArgs) -> Result<PolicyResult> + Send + Sync>;

pub(crate) type ScopeHandler<R> = Box<dyn Fn(Option<&Identity>, R, &CallArgs) -> R + Send + Sync>;

pub(crate) type BeforeHandler =
    Box<dyn Fn(Option<&Identity>, &dyn Resource, &str) -> Option<PolicyResult> + Send + Sync>;

pub(crate) type BeforeScopeHandler<R> =
    Box<dyn Fn(Option<&Identity>, R, &str) -> ControlFlow<R, R> + Send + Sync>;

pub(crate) type FallbackHandler =
    Box<dyn Fn(&str, Option<&Identity>, &dyn Resource, &CallArgs) -> Box<dyn Any> + Send + Sync>;

/// Handlers registered by a policy, keyed by method name.
///
/// Scope and before-scope handlers are generic over the resource type and are
/// stored boxed as `Any`, then recovered by downcasting to the concrete
/// handler type at call time.
#[derive(Default)]
pub(crate) struct HandlerTable {
    pub(crate) can: HashMap<String, CanHandler>,
    pub(crate) scope: HashMap<String, Box<dyn Any + Send + Sync>>,
    pub(crate) before: Option<BeforeHandler>,
    pub(crate) before_scope: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    pub(crate) fallback: Option<FallbackHandler>,
}

/// A resolved policy instance, ready for dispatch.
///
/// Handles are immutable after construction and can be shared between
/// threads and cached by resolvers.
pub struct PolicyHandle {
    name: String,
    table: HandlerTable,
}

impl PolicyHandle {
    /// Build the handler table for `policy`.
    pub fn new<P: Policy>(policy: P) -> Self {
        let mut rules = Rules::new(Arc::new(policy));
        P::rules(&mut rules);

        Self {
            name: TypePath::of::<P>().to_string(),
            table: rules.into_table(),
        }
    }

    /// Type path of the policy this handle was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a handler is registered under `method`, e.g. `canAdd`.
    pub fn has_method(&self, method: &str) -> bool {
        self.table.can.contains_key(method) || self.table.scope.contains_key(method)
    }

    pub(crate) fn before(
        &self,
        identity: Option<&Identity>,
        resource: &dyn Resource,
        action: &str,
    ) -> Option<PolicyResult> {
        self.table
            .before
            .as_ref()
            .and_then(|before| before(identity, resource, action))
    }

    /// Invoke `can<Action>`, falling back to the dynamic handler when one is
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics when the dynamic handler returns something other than a `bool`
    /// or a [`PolicyResult`].
    pub(crate) fn call_can(
        &self,
        action: &str,
        identity: Option<&Identity>,
        resource: &dyn Resource,
        args: &CallArgs,
    ) -> Result<PolicyResult> {
        let method = can_method_name(action);

        if let Some(handler) = self.table.can.get(&method) {
            return handler(identity, resource, args);
        }

        if let Some(fallback) = &self.table.fallback {
            let value = fallback(&method, identity, resource, args);
            let value = match value.downcast::<PolicyResult>() {
                Ok(result) => return Ok(*result),
                Err(value) => value,
            };
            match value.downcast::<bool>() {
                Ok(status) => return Ok(PolicyResult::from(*status)),
                Err(_) => panic!(
                    "`{}::{method}` returned a non-boolean value; policy methods must return `bool` or `PolicyResult`",
                    self.name
                ),
            }
        }

        Err(self.missing_method(method, action))
    }

    /// Run the before-scope pre-check registered for `R`, if any.
    pub(crate) fn before_scope<R: Resource>(
        &self,
        identity: Option<&Identity>,
        resource: R,
        action: &str,
    ) -> ControlFlow<R, R> {
        match self
            .table
            .before_scope
            .get(&TypeId::of::<R>())
            .and_then(|handler| handler.downcast_ref::<BeforeScopeHandler<R>>())
        {
            Some(handler) => handler(identity, resource, action),
            None => ControlFlow::Continue(resource),
        }
    }

    /// Invoke `scope<Action>` for a resource of type `R`.
    pub(crate) fn call_scope<R: Resource>(
        &self,
        action: &str,
        identity: Option<&Identity>,
        resource: R,
        args: &CallArgs,
    ) -> Result<R> {
        let method = scope_method_name(action);

        let Some(handler) = self.table.scope.get(&method) else {
            return Err(self.missing_method(method, action));
        };

        match handler.downcast_ref::<ScopeHandler<R>>() {
            Some(handler) => Ok(handler(identity, resource, args)),
            None => Err(AuthzError::InvalidResource(format!(
                "`{}::{method}` does not accept `{}`",
                self.name,
                resource.type_path()
            ))),
        }
    }

    fn missing_method(&self, method: String, action: &str) -> AuthzError {
        AuthzError::MissingMethod {
            method,
            action: action.to_string(),
            policy: self.name.clone(),
        }
    }
}

impl fmt::Debug for PolicyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self
            .table
            .can
            .keys()
            .chain(self.table.scope.keys())
            .map(String::as_str)
            .collect();
        methods.sort_unstable();

        f.debug_struct("PolicyHandle")
            .field("name", &self.name)
            .field("methods", &methods)
            .field("before", &self.table.before.is_some())
            .field("fallback", &self.table.fallback.is_some())
            .finish()
    }
}
