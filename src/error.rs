//! Error types for the provider runtime and the registry generator.

use std::sync::Arc;

use crate::key::{Key, ScopeId};

/// Runtime errors surfaced by provider resolution and lifecycle operations.
///
/// Build and destroy failures carry their payload behind an [`Arc`] so the
/// error stays [`Clone`]: a single failed build is fanned out verbatim to
/// every caller awaiting the same shared build future.
///
/// # Examples
///
/// ```rust
/// use provident::{Error, Key};
///
/// let err = Error::KeyNotFound { key: Key::new("database") };
/// assert_eq!(err.to_string(), "no provider registered for key 'database'");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Resolution was attempted before a [`Registry`](crate::Registry) was
    /// built, or after it was dropped.
    #[error("resolver is not initialized; build a Registry before resolving providers")]
    ResolverNotInitialized,

    /// No provider is registered under the requested key.
    #[error("no provider registered for key '{key}'")]
    KeyNotFound {
        /// The key that failed to resolve.
        key: Key,
    },

    /// The provider's factory failed. The failed build is never cached; the
    /// next `get` for the same scope retries from scratch.
    #[error("provider '{key}' failed to build for scope '{scope}': {source}")]
    Build {
        /// Key of the provider whose factory failed.
        key: Key,
        /// Effective scope identifier of the failed build.
        scope: ScopeId,
        /// The factory's error.
        source: Arc<anyhow::Error>,
    },

    /// The provider's destroy callback failed. Bookkeeping for the scope is
    /// cleared regardless, so teardown is never observable as stuck.
    #[error("provider '{key}' failed to destroy for scope '{scope}': {source}")]
    Destroy {
        /// Key of the provider whose destroy callback failed.
        key: Key,
        /// Effective scope identifier of the failed teardown.
        scope: ScopeId,
        /// The destroy callback's error.
        source: Arc<anyhow::Error>,
    },

    /// A resolved value was requested under a name that was never declared,
    /// or with a type other than the one its provider produces.
    #[error("no resolved dependency named '{name}' with the requested type")]
    DependencyMismatch {
        /// The local dependency name that failed to downcast.
        name: String,
    },

    /// A cached instance failed to downcast to the provider's own instance
    /// type. Indicates a corrupted registration, not a caller mistake.
    #[error("cached instance for provider '{key}' has an unexpected type")]
    TypeMismatch {
        /// Key of the provider whose cache entry mismatched.
        key: Key,
    },
}

/// Result alias used throughout the runtime.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single dependency cycle discovered at generation time.
///
/// `path` is the slice of the traversal stack from the first occurrence of
/// the repeated key through the key that closed the cycle, in traversal
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Keys participating in the cycle, in traversal order.
    pub path: Vec<String>,
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for key in &self.path {
            write!(f, "'{key}' -> ")?;
        }
        match self.path.first() {
            Some(first) => write!(f, "'{first}'"),
            None => Ok(()),
        }
    }
}

/// Errors surfaced by the registry generation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// One or more dependency cycles were found; no artifact is written.
    #[error("dependency cycle detected: {}", format_cycles(.0))]
    Cycles(Vec<Cycle>),

    /// A declaration references a dependency key that no scanned declaration
    /// provides.
    #[error("provider '{from}' depends on unknown key '{to}' (as '{name}')")]
    UnknownDependency {
        /// Key of the declaring provider.
        from: String,
        /// Local parameter name of the dangling reference.
        name: String,
        /// The referenced key that no declaration provides.
        to: String,
    },

    /// Source discovery failed.
    #[error("provider discovery failed: {0}")]
    Discovery(String),

    /// Reading sources or writing the artifact failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_cycles(cycles: &[Cycle]) -> String {
    cycles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_closes_the_loop() {
        let cycle = Cycle {
            path: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(cycle.to_string(), "'a' -> 'b' -> 'c' -> 'a'");
    }

    #[test]
    fn build_error_is_cloneable() {
        let err = Error::Build {
            key: Key::new("db"),
            scope: ScopeId::from("req-1"),
            source: Arc::new(anyhow::anyhow!("connection refused")),
        };
        let other = err.clone();
        assert_eq!(err.to_string(), other.to_string());
    }
}
