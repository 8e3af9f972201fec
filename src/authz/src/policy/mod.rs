//! Policy definition
//!
//! A policy is a plain Rust type that registers its handlers in a [`Rules`]
//! table. Handlers are looked up by their conventional method names: action
//! `add` is served by `canAdd`, scope action `index` by `scopeIndex`.
//!
//! # Example
//!
//! ```rust
//! use bastion_authz::{Identity, Policy, Resource, Rules};
//!
//! struct Article {
//!     published: bool,
//! }
//!
//! impl Resource for Article {}
//!
//! #[derive(Default)]
//! struct ArticlePolicy;
//!
//! impl ArticlePolicy {
//!     fn can_view(&self, _identity: Option<&Identity>, article: &Article) -> bool {
//!         article.published
//!     }
//! }
//!
//! impl Policy for ArticlePolicy {
//!     fn rules(rules: &mut Rules<Self>) {
//!         rules.can("view", Self::can_view);
//!     }
//! }
//! ```
//!
//! Optional capabilities are narrow traits registered explicitly:
//! [`BeforePolicy`] via [`Rules::before`], [`BeforeScopePolicy`] via
//! [`Rules::before_scope`] and [`DynamicPolicy`] via [`Rules::fallback`].

mod args;
mod handle;

pub use args::CallArgs;
pub use handle::PolicyHandle;

use crate::error::{AuthzError, Result};
use crate::identity::Identity;
use crate::resource::Resource;
use crate::result::PolicyResult;
use handle::{
    BeforeHandler, BeforeScopeHandler, CanHandler, FallbackHandler, HandlerTable, ScopeHandler,
};
use std::any::{Any, TypeId};
use std::ops::ControlFlow;
use std::sync::Arc;

/// Authorization rules for one or more resource types.
pub trait Policy: Send + Sync + Sized + 'static {
    /// Register the handlers this policy answers to.
    fn rules(rules: &mut Rules<Self>);
}

/// Pre-check run before any `can<Action>` handler.
///
/// Returning `Some` makes that result final; `None` continues to the handler.
pub trait BeforePolicy {
    fn before(
        &self,
        identity: Option<&Identity>,
        resource: &dyn Resource,
        action: &str,
    ) -> Option<PolicyResult>;
}

/// Pre-check run before any `scope<Action>` handler for resources of type `R`.
///
/// `ControlFlow::Break(value)` returns `value` as the scope outcome,
/// `ControlFlow::Continue(resource)` hands the resource to the scope handler.
pub trait BeforeScopePolicy<R> {
    fn before_scope(&self, identity: Option<&Identity>, resource: R, action: &str)
        -> ControlFlow<R, R>;
}

/// Catch-all for `can<Action>` methods with no registered handler.
///
/// The returned value must be a `bool` or a [`PolicyResult`]. Anything else is
/// a bug in the policy and aborts the check with a panic.
pub trait DynamicPolicy {
    fn call(
        &self,
        method: &str,
        identity: Option<&Identity>,
        resource: &dyn Resource,
        args: &CallArgs,
    ) -> Box<dyn Any>;
}

/// Handler name for a check action: `add` becomes `canAdd`.
pub fn can_method_name(action: &str) -> String {
    format!("can{}", upper_first(action))
}

/// Handler name for a scope action: `index` becomes `scopeIndex`.
pub fn scope_method_name(action: &str) -> String {
    format!("scope{}", upper_first(action))
}

fn upper_first(action: &str) -> String {
    let mut chars = action.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn downcast_resource<'r, R: Resource>(resource: &'r dyn Resource, method: &str) -> Result<&'r R> {
    resource.as_any().downcast_ref::<R>().ok_or_else(|| {
        AuthzError::InvalidResource(format!(
            "`{method}` expects `{}`, got `{}`",
            std::any::type_name::<R>(),
            resource.type_path()
        ))
    })
}

/// Handler registration table for policy `P`.
pub struct Rules<P> {
    policy: Arc<P>,
    table: HandlerTable,
}

impl<P: Policy> Rules<P> {
    pub(crate) fn new(policy: Arc<P>) -> Self {
        Self {
            policy,
            table: HandlerTable::default(),
        }
    }

    pub(crate) fn into_table(self) -> HandlerTable {
        self.table
    }

    /// Register `can<Action>` for resources of type `R`.
    pub fn can<R, O, F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        R: Resource,
        O: Into<PolicyResult>,
        F: Fn(&P, Option<&Identity>, &R) -> O + Send + Sync + 'static,
    {
        self.can_with(action, move |policy, identity, resource: &R, _args: &CallArgs| {
            handler(policy, identity, resource)
        })
    }

    /// Register `can<Action>` receiving the extra call arguments.
    pub fn can_with<R, O, F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        R: Resource,
        O: Into<PolicyResult>,
        F: Fn(&P, Option<&Identity>, &R, &CallArgs) -> O + Send + Sync + 'static,
    {
        let method = can_method_name(action);
        let policy = Arc::clone(&self.policy);
        let name = method.clone();
        let erased: CanHandler = Box::new(
            move |identity: Option<&Identity>, resource: &dyn Resource, args: &CallArgs| {
                let resource = downcast_resource::<R>(resource, &name)?;
                Ok(handler(&*policy, identity, resource, args).into())
            },
        );
        self.table.can.insert(method, erased);
        self
    }

    /// Register `scope<Action>` for resources of type `R`.
    pub fn scope<R, F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        R: Resource,
        F: Fn(&P, Option<&Identity>, R) -> R + Send + Sync + 'static,
    {
        self.scope_with(action, move |policy, identity, resource: R, _args: &CallArgs| {
            handler(policy, identity, resource)
        })
    }

    /// Register `scope<Action>` receiving the extra call arguments.
    pub fn scope_with<R, F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        R: Resource,
        F: Fn(&P, Option<&Identity>, R, &CallArgs) -> R + Send + Sync + 'static,
    {
        let policy = Arc::clone(&self.policy);
        let erased: ScopeHandler<R> = Box::new(
            move |identity: Option<&Identity>, resource: R, args: &CallArgs| {
                handler(&*policy, identity, resource, args)
            },
        );
        self.table
            .scope
            .insert(scope_method_name(action), Box::new(erased));
        self
    }

    /// Enable the [`BeforePolicy`] pre-check.
    pub fn before(&mut self) -> &mut Self
    where
        P: BeforePolicy,
    {
        let policy = Arc::clone(&self.policy);
        let erased: BeforeHandler = Box::new(
            move |identity: Option<&Identity>, resource: &dyn Resource, action: &str| {
                policy.before(identity, resource, action)
            },
        );
        self.table.before = Some(erased);
        self
    }

    /// Enable the [`BeforeScopePolicy`] pre-check for resources of type `R`.
    pub fn before_scope<R>(&mut self) -> &mut Self
    where
        R: Resource,
        P: BeforeScopePolicy<R>,
    {
        let policy = Arc::clone(&self.policy);
        let erased: BeforeScopeHandler<R> = Box::new(
            move |identity: Option<&Identity>, resource: R, action: &str| {
                policy.before_scope(identity, resource, action)
            },
        );
        self.table
            .before_scope
            .insert(TypeId::of::<R>(), Box::new(erased));
        self
    }

    /// Route unregistered `can<Action>` methods to [`DynamicPolicy::call`].
    pub fn fallback(&mut self) -> &mut Self
    where
        P: DynamicPolicy,
    {
        let policy = Arc::clone(&self.policy);
        let erased: FallbackHandler = Box::new(
            move |method: &str,
                  identity: Option<&Identity>,
                  resource: &dyn Resource,
                  args: &CallArgs| { policy.call(method, identity, resource, args) },
        );
        self.table.fallback = Some(erased);
        self
    }
}
