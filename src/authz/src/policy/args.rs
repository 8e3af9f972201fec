//! Extra handler arguments

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ArgValue = Arc<dyn Any + Send + Sync>;

/// Extra positional and named arguments forwarded verbatim to `*_with`
/// handlers after the identity and the resource.
///
/// ```
/// use bastion_authz::CallArgs;
///
/// let args = CallArgs::new().with(42u32).with_named("tenant", "acme".to_string());
/// assert_eq!(args.get::<u32>(0), Some(&42));
/// assert_eq!(args.named::<String>("tenant").map(String::as_str), Some("acme"));
/// ```
#[derive(Clone, Default)]
pub struct CallArgs {
    positional: Vec<ArgValue>,
    named: HashMap<String, ArgValue>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.positional.push(Arc::new(value));
        self
    }

    /// Add a named argument
    pub fn with_named<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.named.insert(name.into(), Arc::new(value));
        self
    }

    /// Positional argument at `index`, if present and of type `T`
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.positional.get(index)?.downcast_ref::<T>()
    }

    /// Named argument, if present and of type `T`
    pub fn named<T: Any>(&self, name: &str) -> Option<&T> {
        self.named.get(name)?.downcast_ref::<T>()
    }

    /// Number of positional arguments
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.named.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CallArgs")
            .field("positional", &self.positional.len())
            .field("named", &names)
            .finish()
    }
}
