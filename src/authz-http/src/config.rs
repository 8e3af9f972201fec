//! Middleware configuration

use crate::handler::RedirectHandler;
use serde::Deserialize;

/// Settings for [`authorization_middleware`](crate::authorization_middleware)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Attribute holding the raw or wrapped identity
    pub identity_attribute: String,

    /// Attribute the authorization service is stored under
    pub authorization_attribute: String,

    /// Fail requests that finish without any authorization check
    pub require_authorization_check: bool,

    /// Redirect forbidden and anonymous requests instead of returning the
    /// error response
    pub unauthorized_handler: Option<RedirectHandler>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            identity_attribute: "identity".to_string(),
            authorization_attribute: "authorization".to_string(),
            require_authorization_check: true,
            unauthorized_handler: None,
        }
    }
}

/// Settings for
/// [`request_authorization_middleware`](crate::request_authorization_middleware)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestAuthorizationConfig {
    /// Attribute the authorization service is read from
    pub authorization_attribute: String,

    /// Attribute the wrapped identity is read from
    pub identity_attribute: String,

    /// Action checked against the request target
    pub can_method: String,

    /// Redirect denied and anonymous requests here instead of failing
    pub redirect_url: Option<String>,

    /// Query parameter carrying the original target on `GET` redirects
    pub query_param: Option<String>,

    /// Let requests without an identity through unchecked
    pub allow_access_when_identity_is_missing: bool,
}

impl Default for RequestAuthorizationConfig {
    fn default() -> Self {
        Self {
            authorization_attribute: "authorization".to_string(),
            identity_attribute: "identity".to_string(),
            can_method: "access".to_string(),
            redirect_url: None,
            query_param: Some("redirect".to_string()),
            allow_access_when_identity_is_missing: false,
        }
    }
}

impl RequestAuthorizationConfig {
    /// Handler built from `redirect_url` and `query_param`, if redirects are
    /// enabled.
    pub fn redirect_handler(&self) -> Option<RedirectHandler> {
        self.redirect_url
            .as_ref()
            .map(|url| RedirectHandler::new(url.clone()).with_query_param(self.query_param.clone()))
    }
}
