//! Request-boundary middleware
//!
//! - [`authorization_middleware`] creates the per-request
//!   [`AuthorizationService`], wraps the identity and enforces that an
//!   authorization check ran
//! - [`request_authorization_middleware`] checks the request itself against a
//!   request-level policy before the handler runs

use crate::attributes::{Attribute, RequestAttributes};
use crate::config::{AuthorizationConfig, RequestAuthorizationConfig};
use crate::error::{FailureKind, MiddlewareError};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use bastion_authz::{AuthorizationService, AuthzError, Identity, PolicyResolver, Resource};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds an [`Identity`] from the raw value found in the identity attribute.
pub type IdentityDecorator =
    Arc<dyn Fn(Arc<AuthorizationService>, Attribute) -> bastion_authz::Result<Identity> + Send + Sync>;

/// Default decorator: JSON objects become attribute bags, identity objects
/// are wrapped directly.
pub fn default_identity_decorator(
    service: Arc<AuthorizationService>,
    attribute: Attribute,
) -> bastion_authz::Result<Identity> {
    match attribute {
        Attribute::Identity(identity) => Ok(identity),
        Attribute::RawIdentity(value) => Identity::from_value(service, value),
        Attribute::IdentityObject(object) => Ok(Identity::from_object(service, object)),
        Attribute::Authorization(_) => Err(AuthzError::InvalidArgument(
            "an authorization service cannot be used as an identity".to_string(),
        )),
    }
}

/// Shared state of [`authorization_middleware`]
#[derive(Clone)]
pub struct AuthorizationState {
    resolver: Arc<dyn PolicyResolver>,
    config: Arc<AuthorizationConfig>,
    decorator: IdentityDecorator,
}

impl AuthorizationState {
    pub fn new(resolver: Arc<dyn PolicyResolver>) -> Self {
        Self {
            resolver,
            config: Arc::new(AuthorizationConfig::default()),
            decorator: Arc::new(default_identity_decorator),
        }
    }

    pub fn with_config(mut self, config: AuthorizationConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Replace the function used to wrap raw identities.
    pub fn with_identity_decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(Arc<AuthorizationService>, Attribute) -> bastion_authz::Result<Identity>
            + Send
            + Sync
            + 'static,
    {
        self.decorator = Arc::new(decorator);
        self
    }

    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }
}

impl fmt::Debug for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Authorization middleware
///
/// Use with `axum::middleware::from_fn_with_state(state, authorization_middleware)`.
/// The service is reachable both through [`RequestAttributes`] and as an
/// `Extension<Arc<AuthorizationService>>`; a wrapped identity is also
/// available as `Extension<Identity>`.
///
/// An [`Attribute::Identity`] already present under the identity attribute is
/// kept as-is. If it was built against another service, checks made through
/// it mark that service as checked rather than this request's, so the
/// request still fails with [`MiddlewareError::AuthorizationRequired`]
/// unless the handler also uses the injected service.
///
/// Error responses produced by inner authorization layers are passed through
/// untouched. With an `unauthorized_handler` configured, forbidden and
/// anonymous failures become redirects instead.
pub async fn authorization_middleware(
    State(state): State<AuthorizationState>,
    mut request: Request,
    next: Next,
) -> Result<Response, MiddlewareError> {
    let config = Arc::clone(&state.config);
    let target = request.uri().path().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let service = Arc::new(AuthorizationService::new(Arc::clone(&state.resolver)));

    let mut attributes = request
        .extensions_mut()
        .remove::<RequestAttributes>()
        .unwrap_or_default();

    attributes.insert(
        config.authorization_attribute.clone(),
        Attribute::Authorization(Arc::clone(&service)),
    );

    if let Some(raw) = attributes.remove(&config.identity_attribute) {
        let identity = match raw {
            Attribute::Identity(identity) => identity,
            other => (state.decorator)(Arc::clone(&service), other)?,
        };
        request.extensions_mut().insert(identity.clone());
        attributes.insert(config.identity_attribute.clone(), Attribute::Identity(identity));
    }

    request.extensions_mut().insert(Arc::clone(&service));
    request.extensions_mut().insert(attributes);

    let response = next.run(request).await;

    if let Some(kind) = response.extensions().get::<FailureKind>().copied() {
        if let Some(handler) = config
            .unauthorized_handler
            .as_ref()
            .filter(|_| kind.is_redirectable())
        {
            info!(route = %target, failure = ?kind, "Authorization failed, redirecting");
            return Ok(handler.redirect(&method, &uri));
        }
        return Ok(response);
    }

    if config.require_authorization_check && !service.authorization_checked() {
        warn!(route = %target, "Request finished without an authorization check");
        return Err(MiddlewareError::AuthorizationRequired { target });
    }

    debug!(route = %target, status = %response.status(), "Authorization enforced");
    Ok(response)
}

/// The request as a resource: HTTP method plus path.
///
/// Map it to a request-level policy with a `MapResolver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub method: Method,
    pub path: String,
}

impl RequestTarget {
    pub fn of(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
        }
    }
}

impl Resource for RequestTarget {}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Request-level authorization
///
/// Must run inside [`authorization_middleware`]. Use with
/// `axum::middleware::from_fn_with_state(config, request_authorization_middleware)`.
///
/// Requests without an identity are let through when
/// `allow_access_when_identity_is_missing` is set, redirected when a
/// `redirect_url` is configured, and rejected with
/// [`MiddlewareError::MissingIdentity`] otherwise. Denied requests are
/// redirected or rejected with [`MiddlewareError::Forbidden`].
pub async fn request_authorization_middleware(
    State(config): State<RequestAuthorizationConfig>,
    request: Request,
    next: Next,
) -> Result<Response, MiddlewareError> {
    let (service, identity) = {
        let attributes = RequestAttributes::of(&request);
        let service = attributes
            .and_then(|attributes| attributes.authorization(&config.authorization_attribute))
            .ok_or_else(|| MiddlewareError::MissingService {
                attribute: config.authorization_attribute.clone(),
            })?;
        let identity = attributes
            .and_then(|attributes| attributes.identity(&config.identity_attribute))
            .cloned();
        (service, identity)
    };

    let target = RequestTarget::of(&request);
    let redirect = config.redirect_handler();

    let Some(identity) = identity else {
        if config.allow_access_when_identity_is_missing {
            debug!(route = %target, "No identity, access allowed");
            return Ok(next.run(request).await);
        }
        if let Some(handler) = &redirect {
            info!(route = %target, redirect = %handler.url, "No identity, redirecting");
            return Ok(handler.redirect(request.method(), request.uri()));
        }
        warn!(route = %target, "No identity");
        return Err(MiddlewareError::MissingIdentity {
            target: target.to_string(),
        });
    };

    let result = service.can_result(Some(&identity), &config.can_method, &target)?;

    if result.status() {
        debug!(route = %target, "Request authorized");
        return Ok(next.run(request).await);
    }

    match &redirect {
        Some(handler) => {
            info!(route = %target, redirect = %handler.url, "Request denied, redirecting");
            Ok(handler.redirect(request.method(), request.uri()))
        }
        None => {
            warn!(route = %target, reason = ?result.reason(), "Request denied");
            Err(MiddlewareError::Forbidden {
                target: target.to_string(),
                reason: result.reason().map(str::to_string),
            })
        }
    }
}
