//! Registry of constructible policies, addressed by type path

use crate::error::{AuthzError, Result};
use crate::policy::{Policy, PolicyHandle};
use crate::resource::TypePath;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub(crate) type PolicyCtor = Arc<dyn Fn() -> PolicyHandle + Send + Sync>;

/// Policies that can be instantiated by path.
///
/// The catalog is how [`ConventionResolver`](super::ConventionResolver) and
/// [`MapResolver::map_class_name`](super::MapResolver::map_class_name) find a
/// policy from a computed or configured name.
#[derive(Default)]
pub struct PolicyCatalog {
    entries: HashMap<TypePath, PolicyCtor>,
}

impl PolicyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `P` under its own type path.
    pub fn register<P: Policy + Default>(&mut self) -> &mut Self {
        let path = TypePath::of::<P>();
        debug!(policy = %path, "Registering policy");
        self.entries
            .insert(path, Arc::new(|| PolicyHandle::new(P::default())));
        self
    }

    /// Register a policy constructor under an explicit path.
    pub fn register_as<P, F>(&mut self, path: &str, ctor: F) -> Result<&mut Self>
    where
        P: Policy,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let path = TypePath::parse(path)?;
        debug!(policy = %path, "Registering policy");
        self.entries
            .insert(path, Arc::new(move || PolicyHandle::new(ctor())));
        Ok(self)
    }

    pub fn contains(&self, path: &TypePath) -> bool {
        self.entries.contains_key(path)
    }

    /// Build a fresh instance of the policy registered at `path`.
    pub fn instantiate(&self, path: &TypePath) -> Option<PolicyHandle> {
        self.entries.get(path).map(|ctor| ctor())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn constructor(&self, path: &str) -> Result<PolicyCtor> {
        let parsed = TypePath::parse(path)?;
        self.entries.get(&parsed).cloned().ok_or_else(|| {
            AuthzError::InvalidArgument(format!("Policy `{path}` is not registered"))
        })
    }
}

impl fmt::Debug for PolicyCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<String> = self.entries.keys().map(ToString::to_string).collect();
        paths.sort_unstable();
        f.debug_struct("PolicyCatalog").field("policies", &paths).finish()
    }
}
