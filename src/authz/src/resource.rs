//! Resource contract
//!
//! Anything a policy can be asked about implements [`Resource`]. Resolvers
//! identify resources by their runtime type and by the structured
//! [`TypePath`] derived from it.

use crate::error::{AuthzError, Result};
use regex::Regex;
use std::any::Any;
use std::fmt;
use std::sync::OnceLock;

/// Filter map handed to [`Query::and_where`]: field name to expected value.
pub type Conditions = serde_json::Map<String, serde_json::Value>;

/// Upcast helper implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value that policies can make decisions about.
pub trait Resource: AsAny + Send + Sync {
    /// Type path used by the convention resolver and error messages.
    fn type_path(&self) -> TypePath {
        TypePath::from_type_name(std::any::type_name::<Self>())
    }

    /// Structural role of the resource.
    fn role(&self) -> ResourceRole {
        ResourceRole::Entity
    }

    /// Query capability. Resources that wrap a repository return `Some`.
    fn as_query(&self) -> Option<&dyn Query> {
        None
    }
}

/// Collection query bound to an owning repository.
pub trait Query: Send + Sync {
    /// The repository the query reads from.
    fn repository(&self) -> &dyn Resource;

    /// Restrict the query to rows matching all conditions.
    fn and_where(&mut self, conditions: Conditions);
}

/// Structural role of a resource, which decides the naming convention used
/// to locate its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    /// Single record, e.g. `app::model::entity::Article`
    Entity,
    /// Repository or table, e.g. `app::model::table::ArticlesTable`
    Repository,
    /// Controller, e.g. `app::controller::ArticlesController`
    Controller,
    /// Anything without a naming convention
    Other,
}

impl ResourceRole {
    /// Namespace segments that mark the role's layer.
    pub fn layer(&self) -> &'static [&'static str] {
        match self {
            Self::Entity => &["model", "entity"],
            Self::Repository => &["model", "table"],
            Self::Controller => &["controller"],
            Self::Other => &[],
        }
    }

    /// Base name suffix stripped before the policy name is built.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Repository => Some("Table"),
            Self::Controller => Some("Controller"),
            Self::Entity | Self::Other => None,
        }
    }
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("segment pattern is a valid regex")
    })
}

/// Structured type identifier: namespace segments plus a base name.
///
/// ```
/// use bastion_authz::TypePath;
///
/// let path = TypePath::parse("app::model::entity::Article").unwrap();
/// assert_eq!(path.name(), "Article");
/// assert_eq!(path.namespace(), ["app", "model", "entity"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypePath {
    namespace: Vec<String>,
    name: String,
}

impl TypePath {
    /// Build a path from already validated parts.
    pub fn new<I, S>(namespace: I, name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: namespace.into_iter().map(Into::into).collect(),
            name: name.into(),
        }
    }

    /// Parse and validate a `::` separated path.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments: Vec<String> = path.split("::").map(str::to_string).collect();

        if let Some(bad) = segments.iter().find(|s| !segment_pattern().is_match(s)) {
            return Err(AuthzError::InvalidArgument(format!(
                "`{path}` is not a valid type path (bad segment `{bad}`)"
            )));
        }

        let name = segments.pop().unwrap_or_default();
        Ok(Self { namespace: segments, name })
    }

    /// Path of a Rust type name as reported by `std::any::type_name`.
    /// Generic parameters are dropped.
    pub fn from_type_name(type_name: &str) -> Self {
        let base = type_name.split('<').next().unwrap_or(type_name);
        let mut segments: Vec<String> = base.split("::").map(str::to_string).collect();
        let name = segments.pop().unwrap_or_default();
        Self { namespace: segments, name }
    }

    /// Path of `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self::from_type_name(std::any::type_name::<T>())
    }

    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First namespace segment, if any.
    pub fn root(&self) -> Option<&str> {
        self.namespace.first().map(String::as_str)
    }

    /// Index of the first occurrence of `layer` inside the namespace.
    pub fn find_layer(&self, layer: &[&str]) -> Option<usize> {
        if layer.is_empty() || layer.len() > self.namespace.len() {
            return None;
        }
        self.namespace
            .windows(layer.len())
            .position(|window| window.iter().zip(layer).all(|(a, b)| a == b))
    }

    /// Base name with `suffix` removed; unchanged when the name is just the
    /// suffix or does not end with it.
    pub fn base_name_without(&self, suffix: &str) -> &str {
        match self.name.strip_suffix(suffix) {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => &self.name,
        }
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}::")?;
        }
        write!(f, "{}", self.name)
    }
}
