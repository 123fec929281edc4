//! The provider arena: a registry built once at startup that implements the
//! resolution capability every provider depends on.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::deps::ErasedInstance;
use crate::error::{Error, Result};
use crate::key::{Key, ScopeId};
use crate::provider::Provider;
use crate::traits::{ProviderHandle, Resolver};

/// Collects providers and wires them to the registry they will resolve
/// through.
///
/// Registration order is preserved (it drives [`Registry::startup`] and,
/// reversed, [`Registry::shutdown`]). Registering a key twice replaces the
/// earlier provider: last registration wins.
///
/// # Examples
///
/// ```rust
/// use provident::{Provider, RegistryBuilder};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> provident::Result<()> {
/// let registry = RegistryBuilder::new()
///     .register(Provider::builder("answer").build(|_s, _d| async { Ok(42u32) }))
///     .build();
///
/// let provider = registry.get(&"answer".into())?;
/// let value = provider.get_erased("main".into()).await?;
/// assert_eq!(*value.downcast::<u32>().unwrap(), 42);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    providers: Vec<Arc<dyn ProviderHandle>>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed provider.
    pub fn register<T: Send + Sync + 'static>(self, provider: Provider<T>) -> Self {
        self.register_handle(Arc::new(provider))
    }

    /// Registers an already-erased provider handle.
    pub fn register_handle(mut self, handle: Arc<dyn ProviderHandle>) -> Self {
        if let Some(pos) = self
            .providers
            .iter()
            .position(|existing| existing.key() == handle.key())
        {
            warn!(key = %handle.key(), "duplicate registration, last wins");
            self.providers.remove(pos);
        }
        self.providers.push(handle);
        self
    }

    /// Builds the registry and attaches it as the resolver of every
    /// registered provider.
    pub fn build(self) -> Arc<Registry> {
        let mut by_key = HashMap::with_capacity(self.providers.len());
        for (index, provider) in self.providers.iter().enumerate() {
            by_key.insert(provider.key().clone(), index);
        }
        let registry = Arc::new(Registry {
            providers: self.providers,
            by_key,
        });
        let weak: Weak<dyn Resolver> = Arc::downgrade(&registry) as Weak<dyn Resolver>;
        for provider in &registry.providers {
            provider.attach_resolver(weak.clone());
        }
        debug!(providers = registry.len(), "registry built");
        registry
    }
}

/// The concrete [`Resolver`]: an immutable arena of provider handles keyed
/// by their logical identifiers.
///
/// Providers hold only a weak reference back to their registry, so dropping
/// the last `Arc<Registry>` tears the wiring down; resolution afterwards
/// fails with [`Error::ResolverNotInitialized`].
pub struct Registry {
    providers: Vec<Arc<dyn ProviderHandle>>,
    by_key: HashMap<Key, usize>,
}

impl Registry {
    /// Looks up the provider registered under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] when no provider carries that key.
    pub fn get(&self, key: &Key) -> Result<Arc<dyn ProviderHandle>> {
        self.by_key
            .get(key)
            .map(|&index| Arc::clone(&self.providers[index]))
            .ok_or_else(|| Error::KeyNotFound { key: key.clone() })
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.providers.iter().map(|provider| provider.key())
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Builds every provider flagged eager for `scope`, in registration
    /// order, returning key → built instance.
    ///
    /// # Errors
    ///
    /// The first build failure aborts the startup and propagates.
    pub async fn startup(
        &self,
        scope: impl Into<ScopeId>,
    ) -> Result<HashMap<Key, ErasedInstance>> {
        let scope = scope.into();
        let mut built = HashMap::new();
        for provider in self.providers.iter().filter(|p| p.is_eager()) {
            debug!(key = %provider.key(), "eager build");
            let instance = provider.get_erased(scope.clone()).await?;
            built.insert(provider.key().clone(), instance);
        }
        Ok(built)
    }

    /// Destroys every provider's entry for `scope` in reverse registration
    /// order, continuing past failures.
    ///
    /// # Errors
    ///
    /// The first destroy failure encountered, after all providers have been
    /// visited.
    pub async fn shutdown(&self, scope: impl Into<ScopeId>) -> Result<()> {
        let scope = scope.into();
        let mut first_err = None;
        for provider in self.providers.iter().rev() {
            if let Err(err) = provider.destroy_erased(scope.clone()).await {
                warn!(key = %provider.key(), error = %err, "destroy failed during shutdown");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Resolver for Registry {
    fn resolve(&self, key: &Key) -> Result<Arc<dyn ProviderHandle>> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = RegistryBuilder::new()
            .register(Provider::builder("value").build(|_s, _d| async { Ok(1u32) }))
            .register(Provider::builder("value").build(|_s, _d| async { Ok(2u32) }))
            .build();

        assert_eq!(registry.len(), 1);
        let value = registry
            .get(&"value".into())
            .unwrap()
            .get_erased(ScopeId::default())
            .await
            .unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 2);
    }

    #[tokio::test]
    async fn startup_builds_only_eager_providers() {
        let eager_builds = Arc::new(AtomicU32::new(0));
        let lazy_builds = Arc::new(AtomicU32::new(0));

        let registry = RegistryBuilder::new()
            .register(Provider::builder("eager").eager().build({
                let eager_builds = Arc::clone(&eager_builds);
                move |_s, _d| {
                    let eager_builds = Arc::clone(&eager_builds);
                    async move {
                        eager_builds.fetch_add(1, Ordering::SeqCst);
                        Ok("warm")
                    }
                }
            }))
            .register(Provider::builder("lazy").build({
                let lazy_builds = Arc::clone(&lazy_builds);
                move |_s, _d| {
                    let lazy_builds = Arc::clone(&lazy_builds);
                    async move {
                        lazy_builds.fetch_add(1, Ordering::SeqCst);
                        Ok("cold")
                    }
                }
            }))
            .build();

        let built = registry.startup("main").await.unwrap();
        assert_eq!(built.len(), 1);
        assert!(built.contains_key(&Key::new("eager")));
        assert_eq!(eager_builds.load(Ordering::SeqCst), 1);
        assert_eq!(lazy_builds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropping_the_registry_uninitializes_resolution() {
        let dependent = Provider::builder("dependent")
            .dependency("n", "number")
            .build(|_s, deps| async move { Ok(*deps.get::<u32>("n")?) });

        let registry = RegistryBuilder::new()
            .register(Provider::builder("number").build(|_s, _d| async { Ok(5u32) }))
            .register(dependent.clone())
            .build();

        assert_eq!(*dependent.get("s").await.unwrap(), 5);
        drop(registry);

        let fresh = Provider::builder("dependent2")
            .dependency("n", "number")
            .build(|_s, deps| async move { Ok(*deps.get::<u32>("n")?) });
        assert!(matches!(
            fresh.get("s").await,
            Err(Error::ResolverNotInitialized)
        ));
    }
}
