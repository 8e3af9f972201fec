//! Naming-convention policy resolution
//!
//! The policy path is derived from the resource's [`TypePath`]:
//!
//! | Resource | Policy |
//! |---|---|
//! | `app::model::entity::Article` | `app::policy::ArticlePolicy` |
//! | `app::model::table::ArticlesTable` | `app::policy::ArticlesPolicy` |
//! | `app::controller::admin::UsersController` | `app::policy::admin::UsersPolicy` |
//! | `blog::model::entity::Post` | `app::policy::blog::PostPolicy`, then `blog::policy::PostPolicy` |
//!
//! Query resources resolve through their repository.

use super::catalog::PolicyCatalog;
use super::PolicyResolver;
use crate::error::{AuthzError, Result};
use crate::policy::PolicyHandle;
use crate::resource::{Resource, ResourceRole, TypePath};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const POLICY_SEGMENT: &str = "policy";
const POLICY_SUFFIX: &str = "Policy";

/// Resolver that locates policies by naming convention inside a
/// [`PolicyCatalog`].
pub struct ConventionResolver {
    app_namespace: String,
    overrides: HashMap<String, String>,
    catalog: Arc<PolicyCatalog>,
    cache: DashMap<TypePath, Arc<PolicyHandle>>,
}

impl ConventionResolver {
    /// `app_namespace` is the root namespace of the application, e.g. `app`.
    pub fn new(app_namespace: impl Into<String>, catalog: Arc<PolicyCatalog>) -> Self {
        Self {
            app_namespace: app_namespace.into(),
            overrides: HashMap::new(),
            catalog,
            cache: DashMap::new(),
        }
    }

    /// Resolve resources from the `origin` namespace through the policy
    /// namespace of `target`, before falling back to `origin`'s own.
    pub fn with_override(mut self, origin: impl Into<String>, target: impl Into<String>) -> Self {
        self.overrides.insert(origin.into(), target.into());
        self
    }

    /// Policy paths tried for `resource`, in order.
    pub fn candidates(&self, resource: &dyn Resource) -> Result<Vec<TypePath>> {
        let resource = match resource.as_query() {
            Some(query) => query.repository(),
            None => resource,
        };

        let role = resource.role();
        if role == ResourceRole::Other {
            return Err(AuthzError::InvalidResource(format!(
                "`{}` has no naming convention to derive a policy from",
                resource.type_path()
            )));
        }

        let path = resource.type_path();
        let namespace = path.namespace();
        let (origin, sub): (Vec<String>, Vec<String>) = match path.find_layer(role.layer()) {
            Some(index) => (
                namespace[..index].to_vec(),
                namespace[index + role.layer().len()..].to_vec(),
            ),
            None => match namespace.split_first() {
                Some((first, rest)) => (vec![first.clone()], rest.to_vec()),
                None => (Vec::new(), Vec::new()),
            },
        };

        let base = match role.suffix() {
            Some(suffix) => path.base_name_without(suffix),
            None => path.name(),
        };
        let name = format!("{base}{POLICY_SUFFIX}");

        let origin = origin.join("::");
        let policy_path = |root: &str, extra: &[String]| {
            let mut segments: Vec<String> = root.split("::").map(str::to_string).collect();
            segments.push(POLICY_SEGMENT.to_string());
            segments.extend_from_slice(extra);
            segments.extend(sub.iter().cloned());
            TypePath::new(segments, name.clone())
        };

        if origin.is_empty() || origin == self.app_namespace {
            return Ok(vec![policy_path(&self.app_namespace, &[])]);
        }

        let origin_segments: Vec<String> = origin.split("::").map(str::to_string).collect();
        let mut candidates = vec![policy_path(&self.app_namespace, &origin_segments)];
        if let Some(target) = self.overrides.get(&origin) {
            candidates.push(policy_path(target, &[]));
        }
        candidates.push(policy_path(&origin, &[]));
        Ok(candidates)
    }
}

impl PolicyResolver for ConventionResolver {
    fn get_policy(&self, resource: &dyn Resource) -> Result<Arc<PolicyHandle>> {
        for candidate in self.candidates(resource)? {
            if let Some(cached) = self.cache.get(&candidate) {
                return Ok(Arc::clone(cached.value()));
            }

            if let Some(handle) = self.catalog.instantiate(&candidate) {
                debug!(policy = %candidate, "Resolved policy by convention");
                let handle = Arc::new(handle);
                return Ok(Arc::clone(
                    self.cache.entry(candidate).or_insert(handle).value(),
                ));
            }

            debug!(candidate = %candidate, "No policy at candidate path");
        }

        Err(AuthzError::missing_policy(resource))
    }
}

impl fmt::Debug for ConventionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConventionResolver")
            .field("app_namespace", &self.app_namespace)
            .field("overrides", &self.overrides)
            .field("catalog", &self.catalog.len())
            .finish()
    }
}
