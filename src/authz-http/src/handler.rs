//! Redirect handling for authorization failures
//!
//! A [`RedirectHandler`] turns a denied or anonymous request into a `302 Found`.
//! For `GET` requests the original path and query are appended to the
//! target URL so the login page can send the caller back.

use axum::{
    http::{header, uri::PathAndQuery, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedirectHandler {
    /// Target of the redirect, may already carry a query string
    pub url: String,

    /// Query parameter receiving the original request target. `None`
    /// redirects to `url` unchanged.
    pub query_param: Option<String>,
}

impl Default for RedirectHandler {
    fn default() -> Self {
        Self {
            url: "/login".to_string(),
            query_param: Some("redirect".to_string()),
        }
    }
}

impl RedirectHandler {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_query_param(mut self, query_param: Option<String>) -> Self {
        self.query_param = query_param;
        self
    }

    /// Location header value for a request with `method` and `uri`.
    pub fn location(&self, method: &Method, uri: &Uri) -> String {
        match &self.query_param {
            Some(param) if method == Method::GET => {
                let here = uri.path_and_query().map(PathAndQuery::as_str).unwrap_or("/");
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{separator}{param}={}", self.url, urlencoding::encode(here))
            }
            _ => self.url.clone(),
        }
    }

    pub fn redirect(&self, method: &Method, uri: &Uri) -> Response {
        let location = self.location(method, uri);
        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    }
}
