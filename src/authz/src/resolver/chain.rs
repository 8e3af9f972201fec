//! Ordered fallback across resolvers

use super::PolicyResolver;
use crate::error::{AuthzError, Result};
use crate::policy::PolicyHandle;
use crate::resource::Resource;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Tries each resolver in order and returns the first policy found.
///
/// Only `MissingPolicy` moves on to the next resolver; any other error is
/// returned as is. When every resolver misses, the error names the resource
/// itself rather than the last inner failure.
#[derive(Default, Clone)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn PolicyResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn PolicyResolver>>) -> Self {
        Self { resolvers }
    }

    /// Append a resolver to the end of the chain.
    pub fn add(&mut self, resolver: Arc<dyn PolicyResolver>) -> &mut Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl PolicyResolver for ResolverChain {
    fn get_policy(&self, resource: &dyn Resource) -> Result<Arc<PolicyHandle>> {
        for (position, resolver) in self.resolvers.iter().enumerate() {
            match resolver.get_policy(resource) {
                Ok(policy) => return Ok(policy),
                Err(err) if err.is_missing_policy() => {
                    debug!(position, "Resolver missed, trying next");
                }
                Err(err) => return Err(err),
            }
        }

        Err(AuthzError::missing_policy(resource))
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}
