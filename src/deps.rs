//! Resolved dependencies handed to provider factories.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::key::Key;

/// A built instance with its concrete type erased.
///
/// The runtime caches and passes instances in this form; typed access goes
/// through a downcast at the edges ([`Provider::get`](crate::Provider::get),
/// [`Deps::get`], [`Instances::get`](crate::Instances::get)).
pub type ErasedInstance = Arc<dyn Any + Send + Sync>;

/// The dependencies of one provider, resolved for one scope and keyed by
/// their declared local names.
///
/// Handed to the factory as its second argument. Each value is the exact
/// instance the referenced provider's own `get` returns for the same
/// effective scope, so dependency sharing is scope-consistent across every
/// provider that references the same key.
///
/// # Examples
///
/// ```rust,no_run
/// use provident::{Deps, Provider, ScopeId};
///
/// struct Database;
/// struct Repo { db: std::sync::Arc<Database> }
///
/// fn repo() -> Provider<Repo> {
///     Provider::builder("repo")
///         .dependency("db", "database")
///         .build(|_scope: ScopeId, deps: Deps| async move {
///             Ok(Repo { db: deps.get::<Database>("db")? })
///         })
/// }
/// ```
pub struct Deps {
    provider: Key,
    values: HashMap<String, ErasedInstance>,
}

impl Deps {
    pub(crate) fn new(provider: Key, values: HashMap<String, ErasedInstance>) -> Self {
        Self { provider, values }
    }

    pub(crate) fn empty(provider: Key) -> Self {
        Self {
            provider,
            values: HashMap::new(),
        }
    }

    /// Key of the provider these dependencies were resolved for.
    pub fn provider(&self) -> &Key {
        &self.provider
    }

    /// Returns the dependency declared under `name`, downcast to `T`.
    ///
    /// # Errors
    ///
    /// [`Error::DependencyMismatch`] if `name` was never declared or the
    /// referenced provider produces a different type.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.values
            .get(name)
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
            .ok_or_else(|| Error::DependencyMismatch {
                name: name.to_owned(),
            })
    }

    /// Returns the dependency declared under `name` without downcasting.
    pub fn get_erased(&self, name: &str) -> Result<ErasedInstance> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DependencyMismatch {
                name: name.to_owned(),
            })
    }

    /// Number of resolved dependencies.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the provider declared no dependencies.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_to_the_declared_type() {
        let mut values: HashMap<String, ErasedInstance> = HashMap::new();
        values.insert("port".into(), Arc::new(8080u16));
        let deps = Deps::new(Key::new("server"), values);

        assert_eq!(*deps.get::<u16>("port").unwrap(), 8080);
        assert!(matches!(
            deps.get::<String>("port"),
            Err(Error::DependencyMismatch { .. })
        ));
        assert!(matches!(
            deps.get::<u16>("host"),
            Err(Error::DependencyMismatch { .. })
        ));
    }
}
