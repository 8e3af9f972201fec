//! Policy check result

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a policy check: a status and an optional reason.
///
/// Values are immutable once built. Handlers that return a plain `bool` are
/// lifted into a `PolicyResult` without a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    status: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl PolicyResult {
    /// Create a new result
    pub fn new(status: bool, reason: Option<String>) -> Self {
        Self { status, reason }
    }

    /// Allow result without a reason
    pub fn allow() -> Self {
        Self::new(true, None)
    }

    /// Deny result without a reason
    pub fn deny() -> Self {
        Self::new(false, None)
    }

    /// Deny result with a reason
    pub fn deny_with(reason: impl Into<String>) -> Self {
        Self::new(false, Some(reason.into()))
    }

    /// Allow result with a reason
    pub fn allow_with(reason: impl Into<String>) -> Self {
        Self::new(true, Some(reason.into()))
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl From<bool> for PolicyResult {
    fn from(status: bool) -> Self {
        Self::new(status, None)
    }
}

impl fmt::Display for PolicyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.status { "allowed" } else { "denied" };
        match &self.reason {
            Some(reason) => write!(f, "{status}: {reason}"),
            None => write!(f, "{status}"),
        }
    }
}
