//! Map resolver and resolver chain integration tests

use bastion_authz::{
    AuthorizationService, AuthzError, BeforePolicy, ConventionResolver, Identity, MapResolver,
    Policy, PolicyCatalog, PolicyResolver, PolicyResult, Resource, ResourceRole, ResolverChain,
    Rules,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Invoice {
    tenant: String,
}
impl Resource for Invoice {}

struct Receipt;
impl Resource for Receipt {}

struct Refund;
impl Resource for Refund {}

struct Payout;
impl Resource for Payout {}

/// Resource the convention resolver refuses to handle
struct Opaque;
impl Resource for Opaque {
    fn role(&self) -> ResourceRole {
        ResourceRole::Other
    }
}

#[derive(Default)]
struct OpenPolicy;

impl Policy for OpenPolicy {
    fn rules(rules: &mut Rules<Self>) {
        rules.before();
    }
}

impl BeforePolicy for OpenPolicy {
    fn before(
        &self,
        _identity: Option<&Identity>,
        _resource: &dyn Resource,
        _action: &str,
    ) -> Option<PolicyResult> {
        Some(PolicyResult::allow())
    }
}

/// Policy bound to one tenant at construction time
struct TenantPolicy {
    tenant: String,
}

impl Policy for TenantPolicy {
    fn rules(rules: &mut Rules<Self>) {
        rules.can("view", |policy: &Self, _: Option<&Identity>, invoice: &Invoice| {
            policy.tenant == invoice.tenant
        });
    }
}

// ============================================================================
// MAP RESOLVER
// ============================================================================

#[test]
fn test_instance_mapping_is_shared() {
    let mut resolver = MapResolver::new();
    resolver.map_instance::<Invoice, _>(OpenPolicy);

    let invoice = Invoice { tenant: "acme".to_string() };
    let first = resolver.get_policy(&invoice).unwrap();
    let second = resolver.get_policy(&invoice).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_factory_runs_per_lookup() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut resolver = MapResolver::new();
    resolver.map_factory(move |invoice: &Invoice, _resolver: &dyn PolicyResolver| {
        counter.fetch_add(1, Ordering::SeqCst);
        TenantPolicy {
            tenant: invoice.tenant.clone(),
        }
    });

    let service = AuthorizationService::new(Arc::new(resolver));
    let invoice = Invoice { tenant: "acme".to_string() };
    assert!(service.can(None, "view", &invoice).unwrap());
    assert!(service.can(None, "view", &invoice).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_factory_receives_resolver() {
    let mut resolver = MapResolver::new();
    resolver
        .map::<Receipt, OpenPolicy>()
        .map_factory(|_: &Invoice, resolver: &dyn PolicyResolver| {
            assert!(resolver.get_policy(&Receipt).is_ok());
            OpenPolicy
        });

    let invoice = Invoice { tenant: "acme".to_string() };
    assert!(resolver.get_policy(&invoice).is_ok());
}

#[test]
fn test_map_class_name_uses_catalog() {
    let mut catalog = PolicyCatalog::new();
    catalog
        .register_as("billing::policy::InvoicePolicy", || OpenPolicy)
        .unwrap();

    let mut resolver = MapResolver::new();
    resolver
        .map_class_name::<Invoice>(&catalog, "billing::policy::InvoicePolicy")
        .unwrap();
    assert!(resolver.contains::<Invoice>());

    let service = AuthorizationService::new(Arc::new(resolver));
    assert!(service
        .can(None, "view", &Invoice { tenant: "acme".to_string() })
        .unwrap());
}

#[test]
fn test_map_class_name_rejects_bad_paths() {
    let catalog = PolicyCatalog::new();
    let mut resolver = MapResolver::new();

    for path in ["", "billing::", "billing::policy::Missing", "billing/InvoicePolicy"] {
        let err = resolver.map_class_name::<Invoice>(&catalog, path).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidArgument(_)), "{path}");
    }
    assert!(resolver.is_empty());
}

#[test]
fn test_lookup_is_exact_type() {
    let mut resolver = MapResolver::new();
    resolver.map::<Invoice, OpenPolicy>();
    assert!(resolver.get_policy(&Receipt).unwrap_err().is_missing_policy());
}

// ============================================================================
// RESOLVER CHAIN
// ============================================================================

fn mapped<R: Resource>() -> Arc<dyn PolicyResolver> {
    let mut resolver = MapResolver::new();
    resolver.map::<R, OpenPolicy>();
    Arc::new(resolver)
}

#[test]
fn test_chain_falls_through_misses() {
    let chain = ResolverChain::new(vec![mapped::<Receipt>(), mapped::<Invoice>()]);
    assert_eq!(chain.len(), 2);

    let invoice = Invoice { tenant: "acme".to_string() };
    assert!(chain.get_policy(&invoice).is_ok());
    assert!(chain.get_policy(&Receipt).is_ok());
}

#[test]
fn test_chain_all_miss_names_resource() {
    let mut chain = ResolverChain::default();
    assert!(chain.is_empty());
    chain.add(mapped::<Receipt>()).add(mapped::<Invoice>());

    let err = chain.get_policy(&Refund).unwrap_err();
    match err {
        AuthzError::MissingPolicy { resource, .. } => assert!(resource.ends_with("::Refund")),
        other => panic!("expected MissingPolicy, got {other:?}"),
    }
}

#[test]
fn test_chain_propagates_other_errors() {
    let convention: Arc<dyn PolicyResolver> =
        Arc::new(ConventionResolver::new("app", Arc::new(PolicyCatalog::new())));
    let chain = ResolverChain::new(vec![convention, mapped::<Opaque>()]);

    assert!(matches!(
        chain.get_policy(&Opaque),
        Err(AuthzError::InvalidResource(_))
    ));
}

#[test]
fn test_empty_chain_misses() {
    let chain = ResolverChain::new(Vec::new());
    assert!(chain.get_policy(&Payout).unwrap_err().is_missing_policy());
}

// ============================================================================
// PROPERTY-BASED TESTS (PROPTEST)
// ============================================================================

proptest! {
    #[test]
    fn test_map_lookup_matches_registrations(mask in 0u8..16) {
        let mut resolver = MapResolver::new();
        if mask & 1 != 0 { resolver.map::<Invoice, OpenPolicy>(); }
        if mask & 2 != 0 { resolver.map::<Receipt, OpenPolicy>(); }
        if mask & 4 != 0 { resolver.map::<Refund, OpenPolicy>(); }
        if mask & 8 != 0 { resolver.map::<Payout, OpenPolicy>(); }

        let resources: [(u8, &dyn Resource); 4] = [
            (1, &Invoice { tenant: String::new() }),
            (2, &Receipt),
            (4, &Refund),
            (8, &Payout),
        ];

        for (bit, resource) in resources {
            match resolver.get_policy(resource) {
                Ok(_) => prop_assert!(mask & bit != 0),
                Err(err) => {
                    prop_assert!(mask & bit == 0);
                    prop_assert!(err.is_missing_policy());
                }
            }
        }
    }
}
