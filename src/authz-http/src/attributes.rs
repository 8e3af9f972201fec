//! Request attribute bag
//!
//! Middlewares exchange the authorization service and the identity through a
//! string-keyed [`RequestAttributes`] map stored in the request extensions,
//! so the attribute names stay configurable.

use axum::http::Request;
use bastion_authz::{AuthorizationService, Identity, IdentityObject};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A value stored under a request attribute name.
#[derive(Clone)]
pub enum Attribute {
    /// The request's authorization service
    Authorization(Arc<AuthorizationService>),
    /// An identity already wrapped in the decorator
    Identity(Identity),
    /// Raw JSON identity, e.g. decoded claims
    RawIdentity(Value),
    /// Raw application identity object
    IdentityObject(Arc<dyn IdentityObject>),
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization(service) => f.debug_tuple("Authorization").field(service).finish(),
            Self::Identity(identity) => f.debug_tuple("Identity").field(identity).finish(),
            Self::RawIdentity(value) => f.debug_tuple("RawIdentity").field(value).finish(),
            Self::IdentityObject(_) => f.debug_tuple("IdentityObject").finish_non_exhaustive(),
        }
    }
}

/// String-keyed attributes attached to a request.
#[derive(Debug, Clone, Default)]
pub struct RequestAttributes {
    values: HashMap<String, Attribute>,
}

impl RequestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Attribute) -> Option<Attribute> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Authorization service stored under `name`.
    pub fn authorization(&self, name: &str) -> Option<Arc<AuthorizationService>> {
        match self.values.get(name)? {
            Attribute::Authorization(service) => Some(Arc::clone(service)),
            _ => None,
        }
    }

    /// Wrapped identity stored under `name`.
    pub fn identity(&self, name: &str) -> Option<&Identity> {
        match self.values.get(name)? {
            Attribute::Identity(identity) => Some(identity),
            _ => None,
        }
    }

    /// Attributes of `request`, if any were attached.
    pub fn of<B>(request: &Request<B>) -> Option<&Self> {
        request.extensions().get::<Self>()
    }

    /// Insert `value` into the attributes of `request`, creating the bag if
    /// needed.
    pub fn set<B>(request: &mut Request<B>, name: impl Into<String>, value: Attribute) {
        let mut attributes = request.extensions_mut().remove::<Self>().unwrap_or_default();
        attributes.insert(name, value);
        request.extensions_mut().insert(attributes);
    }
}
