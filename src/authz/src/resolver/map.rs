//! Explicit resource type to policy mapping

use super::catalog::{PolicyCatalog, PolicyCtor};
use super::PolicyResolver;
use crate::error::{AuthzError, Result};
use crate::policy::{Policy, PolicyHandle};
use crate::resource::Resource;
use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type PolicyFactory =
    Box<dyn Fn(&dyn Resource, &dyn PolicyResolver) -> Result<PolicyHandle> + Send + Sync>;

/// How a mapped policy is produced
enum PolicySource {
    /// Constructed on first lookup, then cached
    Class(PolicyCtor),
    /// Pre-built instance shared by every lookup
    Instance(Arc<PolicyHandle>),
    /// Invoked on every lookup
    Factory(PolicyFactory),
}

/// Resolver backed by an explicit map keyed by the resource's concrete type.
///
/// Lookups match the exact runtime type; a policy mapped for one type is never
/// returned for another. Mappings are configured up front, after which the
/// resolver can be shared between requests.
///
/// ```
/// use bastion_authz::resolver::{MapResolver, PolicyResolver};
/// use bastion_authz::{Policy, Resource, Rules};
///
/// struct Article;
/// impl Resource for Article {}
///
/// #[derive(Default)]
/// struct ArticlePolicy;
/// impl Policy for ArticlePolicy {
///     fn rules(_rules: &mut Rules<Self>) {}
/// }
///
/// let mut resolver = MapResolver::new();
/// resolver.map::<Article, ArticlePolicy>();
/// assert!(resolver.get_policy(&Article).is_ok());
/// ```
#[derive(Default)]
pub struct MapResolver {
    entries: HashMap<TypeId, PolicySource>,
    cache: DashMap<TypeId, Arc<PolicyHandle>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `R` to policy type `P`, built lazily on first lookup.
    pub fn map<R: Resource, P: Policy + Default>(&mut self) -> &mut Self {
        let ctor: PolicyCtor = Arc::new(|| PolicyHandle::new(P::default()));
        self.insert::<R>(PolicySource::Class(ctor))
    }

    /// Map `R` to an existing policy instance.
    pub fn map_instance<R: Resource, P: Policy>(&mut self, policy: P) -> &mut Self {
        self.insert::<R>(PolicySource::Instance(Arc::new(PolicyHandle::new(policy))))
    }

    /// Map `R` to a factory called with the resource and this resolver on
    /// every lookup.
    pub fn map_factory<R, P, F>(&mut self, factory: F) -> &mut Self
    where
        R: Resource,
        P: Policy,
        F: Fn(&R, &dyn PolicyResolver) -> P + Send + Sync + 'static,
    {
        let erased: PolicyFactory = Box::new(
            move |resource: &dyn Resource, resolver: &dyn PolicyResolver| {
                let resource = resource.as_any().downcast_ref::<R>().ok_or_else(|| {
                    AuthzError::InvalidResource(format!(
                        "factory for `{}` received `{}`",
                        std::any::type_name::<R>(),
                        resource.type_path()
                    ))
                })?;
                Ok(PolicyHandle::new(factory(resource, resolver)))
            },
        );
        self.insert::<R>(PolicySource::Factory(erased))
    }

    /// Map `R` to the policy registered in `catalog` under `path`.
    ///
    /// Fails immediately with `InvalidArgument` when the path is malformed or
    /// not registered.
    pub fn map_class_name<R: Resource>(
        &mut self,
        catalog: &PolicyCatalog,
        path: &str,
    ) -> Result<&mut Self> {
        let ctor = catalog.constructor(path)?;
        Ok(self.insert::<R>(PolicySource::Class(ctor)))
    }

    /// Whether a mapping exists for `R`.
    pub fn contains<R: Resource>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert<R: Resource>(&mut self, source: PolicySource) -> &mut Self {
        let key = TypeId::of::<R>();
        debug!(resource = std::any::type_name::<R>(), "Mapping policy");
        self.cache.remove(&key);
        self.entries.insert(key, source);
        self
    }
}

impl PolicyResolver for MapResolver {
    fn get_policy(&self, resource: &dyn Resource) -> Result<Arc<PolicyHandle>> {
        let key = resource.as_any().type_id();

        match self.entries.get(&key) {
            Some(PolicySource::Instance(handle)) => Ok(Arc::clone(handle)),
            Some(PolicySource::Factory(factory)) => {
                let resolver: &dyn PolicyResolver = self;
                Ok(Arc::new(factory(resource, resolver)?))
            }
            Some(PolicySource::Class(ctor)) => {
                if let Some(cached) = self.cache.get(&key) {
                    return Ok(Arc::clone(cached.value()));
                }
                // Racing lookups may both construct; the first insert wins.
                let handle = Arc::new(ctor());
                debug!(policy = handle.name(), "Instantiated mapped policy");
                Ok(Arc::clone(self.cache.entry(key).or_insert(handle).value()))
            }
            None => Err(AuthzError::missing_policy(resource)),
        }
    }
}

impl fmt::Debug for MapResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapResolver")
            .field("mappings", &self.entries.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Rules;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Article;
    impl Resource for Article {}

    struct Comment;
    impl Resource for Comment {}

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct CountedPolicy;

    impl Default for CountedPolicy {
        fn default() -> Self {
            BUILT.fetch_add(1, Ordering::SeqCst);
            CountedPolicy
        }
    }

    impl Policy for CountedPolicy {
        fn rules(_rules: &mut Rules<Self>) {}
    }

    #[test]
    fn test_class_mapping_is_built_once() {
        let mut resolver = MapResolver::new();
        resolver.map::<Article, CountedPolicy>();
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);

        let first = resolver.get_policy(&Article).unwrap();
        let second = resolver.get_policy(&Article).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unmapped_type_is_missing_policy() {
        let mut resolver = MapResolver::new();
        resolver.map::<Article, CountedPolicy>();

        let err = resolver.get_policy(&Comment).unwrap_err();
        assert!(err.is_missing_policy());
        assert!(err.to_string().contains("Comment"));
    }

    #[test]
    fn test_contains() {
        let mut resolver = MapResolver::new();
        assert!(resolver.is_empty());
        resolver.map::<Comment, CountedPolicy>();
        assert!(resolver.contains::<Comment>());
        assert!(!resolver.contains::<Article>());
    }

    #[test]
    fn test_map_class_name_fails_fast() {
        let catalog = PolicyCatalog::new();
        let mut resolver = MapResolver::new();

        let err = resolver
            .map_class_name::<Article>(&catalog, "app::policy::ArticlePolicy")
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidArgument(_)));
        assert!(!resolver.contains::<Article>());
    }
}
