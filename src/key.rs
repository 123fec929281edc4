//! Provider keys and scope identifiers.

use std::fmt;
use std::sync::Arc;

/// The reserved scope identifier every singleton provider collapses to, and
/// the default when a caller supplies no scope of its own.
pub const SINGLETON_SCOPE: &str = "singleton";

/// Stable logical identifier of a provider.
///
/// Keys are the unit of reference between providers (`dependencies` map to
/// keys, not to provider objects) and the lookup key of the generated
/// registry. Cheap to clone; comparison and hashing operate on the string
/// content.
///
/// # Examples
///
/// ```rust
/// use provident::Key;
///
/// let key = Key::new("database");
/// assert_eq!(key.as_str(), "database");
/// assert_eq!(key, Key::from("database"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Creates a key from anything string-like.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The key as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Caller-supplied identifier partitioning a provider's cache into
/// independent instances.
///
/// Two `get` calls with the same scope identifier share one instance; two
/// calls with different identifiers build independently. Providers flagged
/// as singletons collapse every identifier to [`ScopeId::singleton`] before
/// any cache lookup, and that value is also the [`Default`].
///
/// # Examples
///
/// ```rust
/// use provident::ScopeId;
///
/// let request = ScopeId::from("request-42");
/// assert_eq!(request.as_str(), "request-42");
/// assert_eq!(ScopeId::default(), ScopeId::singleton());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(Arc<str>);

impl ScopeId {
    /// Creates a scope identifier from anything string-like.
    pub fn new(scope: impl Into<Arc<str>>) -> Self {
        Self(scope.into())
    }

    /// The reserved identifier shared instances live under.
    pub fn singleton() -> Self {
        Self::new(SINGLETON_SCOPE)
    }

    /// Whether this is the reserved singleton identifier.
    pub fn is_singleton(&self) -> bool {
        &*self.0 == SINGLETON_SCOPE
    }

    /// The identifier as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::singleton()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(scope: &str) -> Self {
        Self::new(scope)
    }
}

impl From<String> for ScopeId {
    fn from(scope: String) -> Self {
        Self::new(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scope_is_the_reserved_identifier() {
        assert!(ScopeId::default().is_singleton());
        assert_eq!(ScopeId::default().as_str(), SINGLETON_SCOPE);
    }

    #[test]
    fn keys_compare_by_content() {
        assert_eq!(Key::new(String::from("db")), Key::from("db"));
        assert_ne!(Key::from("db"), Key::from("cache"));
    }
}
