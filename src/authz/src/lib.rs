//! # Bastion Authorization
//!
//! Policy-based authorization: an identity, an action and a resource go in,
//! a [`PolicyResult`] comes out.
//!
//! ## Components
//!
//! - **Policies** register `can<Action>` and `scope<Action>` handlers in a
//!   [`Rules`] table, plus optional `before` hooks
//! - **Resolvers** find the policy for a resource: by explicit map, by naming
//!   convention, or through a chain of both
//! - **[`AuthorizationService`]** runs the decision: resolve, before hook,
//!   handler, result
//! - **[`Identity`]** wraps the caller and delegates its capability checks to
//!   the service
//!
//! ## Example
//!
//! ```rust
//! use bastion_authz::resolver::MapResolver;
//! use bastion_authz::{AuthorizationService, Identity, Policy, Resource, Rules};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Article;
//! impl Resource for Article {}
//!
//! #[derive(Default)]
//! struct ArticlePolicy;
//!
//! impl ArticlePolicy {
//!     fn can_add(&self, identity: Option<&Identity>, _article: &Article) -> bool {
//!         identity
//!             .and_then(|user| user.get_str("role"))
//!             .is_some_and(|role| role == "admin" || role == "author")
//!     }
//! }
//!
//! impl Policy for ArticlePolicy {
//!     fn rules(rules: &mut Rules<Self>) {
//!         rules.can("add", Self::can_add);
//!     }
//! }
//!
//! # fn main() -> bastion_authz::Result<()> {
//! let mut resolver = MapResolver::new();
//! resolver.map::<Article, ArticlePolicy>();
//!
//! let service = Arc::new(AuthorizationService::new(Arc::new(resolver)));
//! let admin = Identity::from_value(service.clone(), json!({ "role": "admin" }))?;
//!
//! assert!(admin.can("add", &Article)?);
//! assert!(service.authorization_checked());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod policy;
pub mod resolver;
pub mod resource;
pub mod result;
pub mod service;

pub use error::{AuthzError, Result};
pub use identity::{Identity, IdentityData, IdentityObject};
pub use policy::{
    can_method_name, scope_method_name, BeforePolicy, BeforeScopePolicy, CallArgs, DynamicPolicy,
    Policy, PolicyHandle, Rules,
};
pub use resolver::{
    ConventionResolver, MapResolver, PolicyCatalog, PolicyResolver, ResolverChain,
};
pub use resource::{Conditions, Query, Resource, ResourceRole, TypePath};
pub use result::PolicyResult;
pub use service::AuthorizationService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

