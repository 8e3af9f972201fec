use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bastion_authz::AuthzError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, MiddlewareError>;

/// Attached to the extensions of every [`MiddlewareError`] response.
///
/// [`authorization_middleware`](crate::authorization_middleware) reads it to
/// pass inner failures through and to redirect the redirectable ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthorizationRequired,
    Forbidden,
    MissingIdentity,
    Internal,
}

impl FailureKind {
    pub fn is_redirectable(self) -> bool {
        matches!(self, FailureKind::Forbidden | FailureKind::MissingIdentity)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    #[error("The request to `{target}` did not apply any authorization checks.")]
    AuthorizationRequired { target: String },

    #[error("Identity is not authorized to access `{target}`{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Forbidden {
        target: String,
        reason: Option<String>,
    },

    #[error("An identity is required to access `{target}`")]
    MissingIdentity { target: String },

    #[error("No authorization service found in request attribute `{attribute}`")]
    MissingService { attribute: String },

    #[error(transparent)]
    Authz(#[from] AuthzError),
}

impl MiddlewareError {
    pub fn status(&self) -> StatusCode {
        match self {
            MiddlewareError::AuthorizationRequired { .. } => StatusCode::FORBIDDEN,
            MiddlewareError::Forbidden { .. } => StatusCode::FORBIDDEN,
            MiddlewareError::MissingIdentity { .. } => StatusCode::UNAUTHORIZED,
            MiddlewareError::MissingService { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MiddlewareError::Authz(AuthzError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            MiddlewareError::Authz(AuthzError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            MiddlewareError::Authz(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            MiddlewareError::AuthorizationRequired { .. } => FailureKind::AuthorizationRequired,
            MiddlewareError::Forbidden { .. } => FailureKind::Forbidden,
            MiddlewareError::Authz(AuthzError::Forbidden { .. }) => FailureKind::Forbidden,
            MiddlewareError::MissingIdentity { .. } => FailureKind::MissingIdentity,
            MiddlewareError::MissingService { .. } | MiddlewareError::Authz(_) => {
                FailureKind::Internal
            }
        }
    }
}

impl IntoResponse for MiddlewareError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(kind);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_authz::PolicyResult;

    #[test]
    fn test_status_mapping() {
        let required = MiddlewareError::AuthorizationRequired {
            target: "/articles".to_string(),
        };
        assert_eq!(required.status(), StatusCode::FORBIDDEN);

        let missing = MiddlewareError::MissingService {
            attribute: "authorization".to_string(),
        };
        assert_eq!(missing.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad_identity: MiddlewareError =
            AuthzError::InvalidArgument("identity must be an object".to_string()).into();
        assert_eq!(bad_identity.status(), StatusCode::BAD_REQUEST);

        let denied: MiddlewareError = AuthzError::Forbidden {
            action: "edit".to_string(),
            resource: "app::Article".to_string(),
            result: PolicyResult::deny(),
        }
        .into();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(denied.kind(), FailureKind::Forbidden);

        let anonymous = MiddlewareError::MissingIdentity {
            target: "GET /admin".to_string(),
        };
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert!(anonymous.kind().is_redirectable());

        let unresolved: MiddlewareError = AuthzError::InvalidResource("opaque".to_string()).into();
        assert_eq!(unresolved.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!unresolved.kind().is_redirectable());
    }

    #[test]
    fn test_response_carries_failure_kind() {
        let response = MiddlewareError::AuthorizationRequired {
            target: "/articles".to_string(),
        }
        .into_response();
        assert_eq!(
            response.extensions().get::<FailureKind>(),
            Some(&FailureKind::AuthorizationRequired)
        );
    }

    #[test]
    fn test_forbidden_message() {
        let err = MiddlewareError::Forbidden {
            target: "GET /admin".to_string(),
            reason: Some("admins only".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Identity is not authorized to access `GET /admin`: admins only"
        );
    }
}
