//! Composition helpers built purely on the resolver seam and the provider
//! contract: batch lookup, single lookup, and scoped use-with-auto-dispose
//! over several providers at once.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::deps::ErasedInstance;
use crate::error::{Error, Result};
use crate::key::{Key, ScopeId};
use crate::traits::{ProviderHandle, Resolver};

/// Resolves a batch of `(local name, provider key)` pairs to their provider
/// handles in one resolver call. Nothing is built.
///
/// # Errors
///
/// [`Error::KeyNotFound`] on the first unknown key.
pub fn providers(
    resolver: &dyn Resolver,
    names: &[(&str, &str)],
) -> Result<HashMap<String, Arc<dyn ProviderHandle>>> {
    let pairs = to_pairs(names);
    let resolved = resolver.resolve_map(&pairs)?;
    Ok(resolved.into_iter().collect())
}

/// Resolves a single key to its provider handle. Nothing is built.
pub fn provider(resolver: &dyn Resolver, key: impl Into<Key>) -> Result<Arc<dyn ProviderHandle>> {
    resolver.resolve(&key.into())
}

/// Resolves every named provider, builds each one concurrently for `scope`,
/// hands the callback an [`Instances`] view, and unconditionally disposes
/// every resolved provider for that scope afterwards.
///
/// The callback's outcome is what the caller observes; dispose-side
/// failures during cleanup are logged and suppressed. If one of the builds
/// fails, the others are still released before the build error propagates.
///
/// # Examples
///
/// ```rust
/// use provident::{compose, Provider, RegistryBuilder};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> provident::Result<()> {
/// let registry = RegistryBuilder::new()
///     .register(Provider::builder("host").build(|_s, _d| async { Ok("localhost".to_string()) }))
///     .register(Provider::builder("port").build(|_s, _d| async { Ok(8080u16) }))
///     .build();
///
/// let url = compose::use_providers(
///     registry.as_ref(),
///     &[("host", "host"), ("port", "port")],
///     "startup",
///     |instances| async move {
///         Ok::<_, provident::Error>(format!(
///             "{}:{}",
///             instances.get::<String>("host")?,
///             instances.get::<u16>("port")?,
///         ))
///     },
/// )
/// .await?;
/// assert_eq!(url, "localhost:8080");
/// # Ok(())
/// # }
/// ```
pub async fn use_providers<R, E, F, Fut>(
    resolver: &dyn Resolver,
    names: &[(&str, &str)],
    scope: impl Into<ScopeId>,
    f: F,
) -> Result<R, E>
where
    F: FnOnce(Instances) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
    E: From<Error>,
{
    let scope = scope.into();
    let pairs = to_pairs(names);
    let handles = resolver.resolve_map(&pairs)?;

    let builds = handles.iter().map(|(name, handle)| {
        let scope = scope.clone();
        async move {
            Ok::<_, Error>((name.clone(), handle.get_erased(scope).await?))
        }
    });
    let outcome = match try_join_all(builds).await {
        Ok(resolved) => f(Instances::new(resolved.into_iter().collect())).await,
        Err(err) => Err(E::from(err)),
    };

    for (name, handle) in &handles {
        if let Err(err) = handle.dispose_erased(scope.clone()).await {
            warn!(provider = %name, error = %err, "failed to dispose after use");
        } else {
            debug!(provider = %name, "disposed after use");
        }
    }
    outcome
}

fn to_pairs(names: &[(&str, &str)]) -> Vec<(String, Key)> {
    names
        .iter()
        .map(|(name, key)| ((*name).to_owned(), Key::new(*key)))
        .collect()
}

/// Built instances keyed by the caller-chosen local names, as handed to a
/// [`use_providers`] callback.
pub struct Instances {
    values: HashMap<String, ErasedInstance>,
}

impl Instances {
    fn new(values: HashMap<String, ErasedInstance>) -> Self {
        Self { values }
    }

    /// Returns the instance built under `name`, downcast to `T`.
    ///
    /// # Errors
    ///
    /// [`Error::DependencyMismatch`] if `name` was not requested or the
    /// provider behind it produces a different type.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.values
            .get(name)
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
            .ok_or_else(|| Error::DependencyMismatch {
                name: name.to_owned(),
            })
    }

    /// Returns the instance built under `name` without downcasting.
    pub fn get_erased(&self, name: &str) -> Result<ErasedInstance> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DependencyMismatch {
                name: name.to_owned(),
            })
    }

    /// Number of built instances.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no instances were requested.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
