//! Convention resolver integration tests
//!
//! The modules below mirror an application layout; their type paths are
//! rooted at this test crate, `convention_tests`.

use bastion_authz::{
    AuthorizationService, AuthzError, ConventionResolver, Identity, Policy, PolicyCatalog,
    PolicyResolver, Resource, ResourceRole, Rules, TypePath,
};
use serde_json::json;
use std::sync::Arc;

const APP: &str = "convention_tests";

mod model {
    pub mod entity {
        use bastion_authz::Resource;

        pub struct Article {
            pub published: bool,
        }

        impl Resource for Article {}

        pub struct Comment;

        impl Resource for Comment {}
    }

    pub mod table {
        use bastion_authz::{Conditions, Query, Resource, ResourceRole};

        #[derive(Default)]
        pub struct ArticlesTable;

        impl Resource for ArticlesTable {
            fn role(&self) -> ResourceRole {
                ResourceRole::Repository
            }
        }

        #[derive(Default)]
        pub struct ArticlesQuery {
            pub table: ArticlesTable,
            pub conditions: Conditions,
        }

        impl Resource for ArticlesQuery {
            fn as_query(&self) -> Option<&dyn Query> {
                Some(self)
            }
        }

        impl Query for ArticlesQuery {
            fn repository(&self) -> &dyn Resource {
                &self.table
            }

            fn and_where(&mut self, conditions: Conditions) {
                self.conditions.extend(conditions);
            }
        }
    }
}

mod controller {
    pub mod admin {
        use bastion_authz::{Resource, ResourceRole};

        pub struct UsersController;

        impl Resource for UsersController {
            fn role(&self) -> ResourceRole {
                ResourceRole::Controller
            }
        }
    }
}

mod policy {
    use super::model::entity::Article;
    use super::model::table::{ArticlesQuery, ArticlesTable};
    use bastion_authz::{Conditions, Identity, Policy, Query, Rules};
    use serde_json::json;

    #[derive(Default)]
    pub struct ArticlePolicy;

    impl Policy for ArticlePolicy {
        fn rules(rules: &mut Rules<Self>) {
            rules.can("view", |_: &Self, _: Option<&Identity>, article: &Article| {
                article.published
            });
        }
    }

    #[derive(Default)]
    pub struct ArticlesPolicy;

    impl ArticlesPolicy {
        fn can_truncate(&self, identity: Option<&Identity>, _table: &ArticlesTable) -> bool {
            identity.and_then(|user| user.get_str("role")).as_deref() == Some("admin")
        }

        fn scope_index(&self, _identity: Option<&Identity>, mut query: ArticlesQuery) -> ArticlesQuery {
            let mut conditions = Conditions::new();
            conditions.insert("published".to_string(), json!(true));
            query.and_where(conditions);
            query
        }
    }

    impl Policy for ArticlesPolicy {
        fn rules(rules: &mut Rules<Self>) {
            rules
                .can("truncate", Self::can_truncate)
                .scope("index", Self::scope_index);
        }
    }

    pub mod admin {
        use super::super::controller::admin::UsersController;
        use bastion_authz::{Identity, Policy, Rules};

        #[derive(Default)]
        pub struct UsersPolicy;

        impl Policy for UsersPolicy {
            fn rules(rules: &mut Rules<Self>) {
                rules.can("index", |_: &Self, identity: Option<&Identity>, _: &UsersController| {
                    identity.is_some()
                });
            }
        }
    }
}

fn catalog() -> Arc<PolicyCatalog> {
    let mut catalog = PolicyCatalog::new();
    catalog
        .register::<policy::ArticlePolicy>()
        .register::<policy::ArticlesPolicy>()
        .register::<policy::admin::UsersPolicy>();
    Arc::new(catalog)
}

fn service() -> Arc<AuthorizationService> {
    let resolver = ConventionResolver::new(APP, catalog());
    Arc::new(AuthorizationService::new(Arc::new(resolver)))
}

#[test]
fn test_entity_resolves_to_app_policy() {
    let resolver = ConventionResolver::new(APP, catalog());
    let article = model::entity::Article { published: true };

    let candidates = resolver.candidates(&article).unwrap();
    assert_eq!(candidates, [TypePath::of::<policy::ArticlePolicy>()]);

    let handle = resolver.get_policy(&article).unwrap();
    assert_eq!(handle.name(), "convention_tests::policy::ArticlePolicy");
    assert!(handle.has_method("canView"));
}

#[test]
fn test_entity_decision() {
    let service = service();
    assert!(service
        .can(None, "view", &model::entity::Article { published: true })
        .unwrap());
    assert!(!service
        .can(None, "view", &model::entity::Article { published: false })
        .unwrap());
}

#[test]
fn test_repository_policy_drops_table_suffix() {
    let service = service();
    let admin = Identity::from_value(Arc::clone(&service), json!({ "role": "admin" })).unwrap();

    assert!(admin.can("truncate", &model::table::ArticlesTable).unwrap());
}

#[test]
fn test_query_resolves_through_repository() {
    let service = service();
    let query = service
        .apply_scope(None, "index", model::table::ArticlesQuery::default())
        .unwrap();
    assert_eq!(query.conditions.get("published"), Some(&json!(true)));
}

#[test]
fn test_query_without_policy_hints_at_repository() {
    let mut bare = PolicyCatalog::new();
    bare.register::<policy::ArticlePolicy>();
    let resolver = ConventionResolver::new(APP, Arc::new(bare));

    let err = resolver
        .get_policy(&model::table::ArticlesQuery::default())
        .unwrap_err();
    let message = err.to_string();
    assert!(err.is_missing_policy());
    assert!(message.contains("ArticlesQuery` has not been defined."));
    assert!(message.contains("convention_tests::model::table::ArticlesTable"));
}

#[test]
fn test_controller_sub_namespace() {
    let service = service();
    let user = Identity::from_value(Arc::clone(&service), json!({ "id": 1 })).unwrap();

    assert!(user.can("index", &controller::admin::UsersController).unwrap());
    assert!(!service
        .can(None, "index", &controller::admin::UsersController)
        .unwrap());
}

#[test]
fn test_missing_convention_policy() {
    let err = service()
        .can(None, "view", &model::entity::Comment)
        .unwrap_err();
    assert!(matches!(
        err,
        AuthzError::MissingPolicy { ref resource, hint: None }
            if resource == "convention_tests::model::entity::Comment"
    ));
}

#[test]
fn test_resolved_policies_are_cached() {
    let resolver = ConventionResolver::new(APP, catalog());
    let article = model::entity::Article { published: true };

    let first = resolver.get_policy(&article).unwrap();
    let second = resolver.get_policy(&article).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

// ============================================================================
// PLUGIN NAMESPACES
// ============================================================================

/// Entity living in a plugin namespace
struct PluginPost;

impl Resource for PluginPost {
    fn type_path(&self) -> TypePath {
        TypePath::new(["blog", "model", "entity"], "Post")
    }
}

/// Returns a fixed verdict, so tests can tell which candidate won
struct Verdict(&'static str);

impl Policy for Verdict {
    fn rules(rules: &mut Rules<Self>) {
        rules.can("view", |verdict: &Self, identity: Option<&Identity>, _: &PluginPost| {
            identity.and_then(|user| user.get_str("expect")).as_deref() == Some(verdict.0)
        });
    }
}

fn resolves_to(resolver: ConventionResolver, expected: &str) -> bool {
    let service = Arc::new(AuthorizationService::new(Arc::new(resolver)));
    let probe = Identity::from_value(Arc::clone(&service), json!({ "expect": expected })).unwrap();
    probe.can("view", &PluginPost).unwrap()
}

#[test]
fn test_plugin_falls_back_to_own_namespace() {
    let mut catalog = PolicyCatalog::new();
    catalog.register_as("blog::policy::PostPolicy", || Verdict("blog")).unwrap();

    assert!(resolves_to(ConventionResolver::new("app", Arc::new(catalog)), "blog"));
}

#[test]
fn test_plugin_override_precedes_origin() {
    let mut catalog = PolicyCatalog::new();
    catalog.register_as("blog::policy::PostPolicy", || Verdict("blog")).unwrap();
    catalog.register_as("cms::policy::PostPolicy", || Verdict("cms")).unwrap();
    let catalog = Arc::new(catalog);

    let overridden = ConventionResolver::new("app", Arc::clone(&catalog)).with_override("blog", "cms");
    assert!(resolves_to(overridden, "cms"));

    let plain = ConventionResolver::new("app", catalog);
    assert!(resolves_to(plain, "blog"));
}

#[test]
fn test_app_policy_precedes_plugin() {
    let mut catalog = PolicyCatalog::new();
    catalog.register_as("app::policy::blog::PostPolicy", || Verdict("app")).unwrap();
    catalog.register_as("cms::policy::PostPolicy", || Verdict("cms")).unwrap();
    catalog.register_as("blog::policy::PostPolicy", || Verdict("blog")).unwrap();

    let resolver = ConventionResolver::new("app", Arc::new(catalog)).with_override("blog", "cms");
    assert!(resolves_to(resolver, "app"));
}

#[test]
fn test_other_role_is_rejected() {
    struct Blob;
    impl Resource for Blob {
        fn role(&self) -> ResourceRole {
            ResourceRole::Other
        }
    }

    let err = service().can(None, "view", &Blob).unwrap_err();
    assert!(matches!(err, AuthzError::InvalidResource(_)));
}
