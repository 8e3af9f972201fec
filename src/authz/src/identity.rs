//! Identity Decorator
//!
//! [`Identity`] wraps the application's raw identity and answers capability
//! questions about it by delegating to the request's
//! [`AuthorizationService`].

use crate::error::{AuthzError, Result};
use crate::policy::CallArgs;
use crate::resource::Resource;
use crate::result::PolicyResult;
use crate::service::AuthorizationService;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Identity backed by an application object with fields and methods.
pub trait IdentityObject: Send + Sync {
    /// Read a named field.
    fn get(&self, name: &str) -> Option<Value>;

    /// Invoke a named method.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value>;

    /// The raw value this object decorates, when it is itself a decorator.
    fn original_data(&self) -> Option<IdentityData> {
        None
    }
}

/// Raw identity value wrapped by [`Identity`].
#[derive(Clone)]
pub enum IdentityData {
    /// Key/value attribute bag
    Attributes(Map<String, Value>),
    /// Application object
    Object(Arc<dyn IdentityObject>),
}

impl IdentityData {
    pub fn as_attributes(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Attributes(attributes) => Some(attributes),
            Self::Object(_) => None,
        }
    }
}

impl fmt::Debug for IdentityData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributes(attributes) => f.debug_tuple("Attributes").field(attributes).finish(),
            Self::Object(_) => f.debug_tuple("Object").finish_non_exhaustive(),
        }
    }
}

/// The caller on whose behalf decisions are made.
///
/// ```
/// use bastion_authz::resolver::MapResolver;
/// use bastion_authz::{AuthorizationService, Identity};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let service = Arc::new(AuthorizationService::new(Arc::new(MapResolver::new())));
/// let identity = Identity::from_value(service, json!({ "id": 7, "role": "author" })).unwrap();
/// assert_eq!(identity.get_str("role").as_deref(), Some("author"));
/// ```
#[derive(Clone)]
pub struct Identity {
    service: Arc<AuthorizationService>,
    data: IdentityData,
}

impl Identity {
    pub fn new(service: Arc<AuthorizationService>, data: IdentityData) -> Self {
        Self { service, data }
    }

    /// Wrap a JSON identity. Only objects are accepted.
    pub fn from_value(service: Arc<AuthorizationService>, value: Value) -> Result<Self> {
        match value {
            Value::Object(attributes) => Ok(Self::new(service, IdentityData::Attributes(attributes))),
            other => Err(AuthzError::InvalidArgument(format!(
                "Identity data must be a JSON object or an `IdentityObject`, got `{}`",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_object(service: Arc<AuthorizationService>, object: Arc<dyn IdentityObject>) -> Self {
        Self::new(service, IdentityData::Object(object))
    }

    pub fn can(&self, action: &str, resource: &dyn Resource) -> Result<bool> {
        self.service.can(Some(self), action, resource)
    }

    pub fn can_with(&self, action: &str, resource: &dyn Resource, args: &CallArgs) -> Result<bool> {
        self.service.can_with(Some(self), action, resource, args)
    }

    pub fn can_result(&self, action: &str, resource: &dyn Resource) -> Result<PolicyResult> {
        self.service.can_result(Some(self), action, resource)
    }

    pub fn can_result_with(
        &self,
        action: &str,
        resource: &dyn Resource,
        args: &CallArgs,
    ) -> Result<PolicyResult> {
        self.service.can_result_with(Some(self), action, resource, args)
    }

    pub fn apply_scope<R: Resource>(&self, action: &str, resource: R) -> Result<R> {
        self.service.apply_scope(Some(self), action, resource)
    }

    pub fn apply_scope_with<R: Resource>(
        &self,
        action: &str,
        resource: R,
        args: &CallArgs,
    ) -> Result<R> {
        self.service.apply_scope_with(Some(self), action, resource, args)
    }

    /// Fails with `Forbidden` when the check is denied.
    pub fn authorize(&self, action: &str, resource: &dyn Resource) -> Result<PolicyResult> {
        self.service.authorize(Some(self), action, resource)
    }

    /// The innermost raw identity, looking through nested decorators.
    pub fn original_data(&self) -> IdentityData {
        match &self.data {
            IdentityData::Object(object) => {
                object.original_data().unwrap_or_else(|| self.data.clone())
            }
            IdentityData::Attributes(_) => self.data.clone(),
        }
    }

    /// The value wrapped by this decorator.
    pub fn data(&self) -> &IdentityData {
        &self.data
    }

    /// Read an attribute or object field.
    pub fn get(&self, name: &str) -> Option<Value> {
        match &self.data {
            IdentityData::Attributes(attributes) => attributes.get(name).cloned(),
            IdentityData::Object(object) => object.get(name),
        }
    }

    /// Read a string attribute.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Forward a method call to the wrapped object.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        match &self.data {
            IdentityData::Object(object) => object.call(method, args),
            IdentityData::Attributes(_) => Err(AuthzError::InvalidOperation(format!(
                "Cannot call `{method}` on an attribute bag identity"
            ))),
        }
    }

    /// Set an attribute. Object identities are read-only.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        match &mut self.data {
            IdentityData::Attributes(attributes) => {
                attributes.insert(name.into(), value);
                Ok(())
            }
            IdentityData::Object(_) => Err(AuthzError::InvalidOperation(format!(
                "Cannot set `{}` on an object identity",
                name.into()
            ))),
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Result<Option<Value>> {
        match &mut self.data {
            IdentityData::Attributes(attributes) => Ok(attributes.remove(name)),
            IdentityData::Object(_) => Err(AuthzError::InvalidOperation(format!(
                "Cannot remove `{name}` from an object identity"
            ))),
        }
    }

    pub fn service(&self) -> &Arc<AuthorizationService> {
        &self.service
    }
}

impl IdentityObject for Identity {
    fn get(&self, name: &str) -> Option<Value> {
        Identity::get(self, name)
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        Identity::call(self, method, args)
    }

    fn original_data(&self) -> Option<IdentityData> {
        Some(Identity::original_data(self))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("data", &self.data).finish_non_exhaustive()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
