//! Error types for the authorization layer

use crate::resource::Resource;
use crate::result::PolicyResult;
use thiserror::Error;

/// Authorization errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// No resolver could find a policy for the resource
    #[error("Policy for `{resource}` has not been defined.{}", .hint.as_deref().unwrap_or(""))]
    MissingPolicy {
        /// Type path of the resource that has no policy
        resource: String,
        /// Extra guidance when the resource looks like a query
        hint: Option<String>,
    },

    /// The policy has no handler for the requested action
    #[error("Method `{method}` for invoking action `{action}` has not been defined in `{policy}`.")]
    MissingMethod {
        /// Expected handler name, e.g. `canAdd`
        method: String,
        /// Action that was requested
        action: String,
        /// Name of the policy that was resolved
        policy: String,
    },

    /// The resource is not something the resolver or handler can work with
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Malformed configuration input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not supported by the wrapped value
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// An explicit `authorize` call was denied
    #[error("Identity is not authorized to perform `{action}` on `{resource}`{}", .result.reason().map(|r| format!(": {r}")).unwrap_or_default())]
    Forbidden {
        /// Action that was denied
        action: String,
        /// Type path of the resource
        resource: String,
        /// The failed decision
        result: PolicyResult,
    },
}

impl AuthzError {
    /// Builds a `MissingPolicy` error for a resource, adding a hint when the
    /// resource wraps a repository.
    pub fn missing_policy(resource: &dyn Resource) -> Self {
        let hint = resource.as_query().map(|query| {
            format!(
                " This resource looks like a `Query`. If you are using `ConventionResolver`, \
                 you should create a new policy for your `{}` type in its `policy` module.",
                query.repository().type_path()
            )
        });

        AuthzError::MissingPolicy {
            resource: resource.type_path().to_string(),
            hint,
        }
    }

    /// Returns true for `MissingPolicy`
    pub fn is_missing_policy(&self) -> bool {
        matches!(self, AuthzError::MissingPolicy { .. })
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
