//! axum integration for `bastion-authz`
//!
//! [`authorization_middleware`] gives every request its own
//! [`AuthorizationService`](bastion_authz::AuthorizationService), wraps the
//! caller's identity and fails closed when a handler never ran a check.
//! [`request_authorization_middleware`] authorizes the request target itself.
//!
//! ```no_run
//! use axum::{middleware, routing::get, Extension, Router};
//! use bastion_authz::{AuthorizationService, MapResolver};
//! use bastion_authz_http::{authorization_middleware, AuthorizationState};
//! use std::sync::Arc;
//!
//! async fn health(Extension(service): Extension<Arc<AuthorizationService>>) -> &'static str {
//!     service.skip_authorization();
//!     "ok"
//! }
//!
//! let state = AuthorizationState::new(Arc::new(MapResolver::new()));
//! let app: Router = Router::new()
//!     .route("/health", get(health))
//!     .layer(middleware::from_fn_with_state(state, authorization_middleware));
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;

pub use attributes::{Attribute, RequestAttributes};
pub use config::{AuthorizationConfig, RequestAuthorizationConfig};
pub use error::{FailureKind, MiddlewareError, Result};
pub use handler::RedirectHandler;
pub use middleware::{
    authorization_middleware, default_identity_decorator, request_authorization_middleware,
    AuthorizationState, IdentityDecorator, RequestTarget,
};
