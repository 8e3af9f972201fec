//! Policy resolution strategies
//!
//! A resolver maps a resource to the policy that governs it. Three
//! strategies are provided:
//!
//! - [`MapResolver`]: explicit resource type to policy registration
//! - [`ConventionResolver`]: derives the policy path from the resource's
//!   type path
//! - [`ResolverChain`]: tries several resolvers in order

mod catalog;
mod chain;
mod convention;
mod map;

pub use catalog::PolicyCatalog;
pub use chain::ResolverChain;
pub use convention::ConventionResolver;
pub use map::MapResolver;

use crate::error::Result;
use crate::policy::PolicyHandle;
use crate::resource::Resource;
use std::sync::Arc;

/// Resolves the policy responsible for a resource.
///
/// Implementations fail with [`AuthzError::MissingPolicy`] when nothing
/// matches and with [`AuthzError::InvalidResource`] when the resource cannot
/// be resolved by this strategy at all.
///
/// [`AuthzError::MissingPolicy`]: crate::AuthzError::MissingPolicy
/// [`AuthzError::InvalidResource`]: crate::AuthzError::InvalidResource
pub trait PolicyResolver: Send + Sync {
    fn get_policy(&self, resource: &dyn Resource) -> Result<Arc<PolicyHandle>>;
}

