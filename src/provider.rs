//! The lifecycle-managed provider: a factory plus a reference-counted,
//! scope-keyed instance cache with coordinated async build and teardown.

use std::sync::{Arc, Weak};

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, debug_span, info_span, warn, Instrument};

use crate::cache::{BeginGet, BuildFuture, DestroyFuture, ScopeCache};
use crate::deps::{Deps, ErasedInstance};
use crate::error::{Error, Result};
use crate::key::{Key, ScopeId};
use crate::traits::{ProviderHandle, Resolver};

type BuildFn<T> = Box<dyn Fn(ScopeId, Deps) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type DestroyFn<T> =
    Box<dyn Fn(ScopeId, Arc<T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    singleton: bool,
    eager: bool,
    hidden: bool,
    disable_dispose_destroy: bool,
}

struct ProviderInner<T> {
    key: Key,
    dependencies: Vec<(String, Key)>,
    flags: Flags,
    build: BuildFn<T>,
    destroy: Option<DestroyFn<T>>,
    cache: ScopeCache,
    resolver: RwLock<Option<Weak<dyn Resolver>>>,
}

/// A lifecycle-managed factory/cache unit keyed by a logical identifier.
///
/// Each provider owns its own scope-keyed cache: for every scope identifier
/// there is at most one build (in flight or settled), one non-negative
/// reference count, and at most one in-flight teardown. Concurrent `get`
/// calls for the same scope share a single factory invocation; concurrent
/// `destroy` calls collapse into a single teardown.
///
/// Cloning a provider is cheap and shares the cache: a clone observes the
/// same instances as the original.
///
/// # Examples
///
/// ```rust
/// use provident::Provider;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> provident::Result<()> {
/// let greeting: Provider<String> = Provider::builder("greeting")
///     .build(|scope, _deps| async move { Ok(format!("hello from {scope}")) });
///
/// let a = greeting.get("req-1").await?;
/// let b = greeting.get("req-1").await?;
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// # Ok(())
/// # }
/// ```
pub struct Provider<T> {
    inner: Arc<ProviderInner<T>>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Provider<T> {
    /// Starts building a provider for `key`.
    pub fn builder(key: impl Into<Key>) -> ProviderBuilder<T> {
        ProviderBuilder::new(key.into())
    }

    /// Stable logical identifier of this provider.
    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    /// Declared dependencies in declaration order.
    pub fn dependencies(&self) -> &[(String, Key)] {
        &self.inner.dependencies
    }

    /// Returns the instance for `scope`, building it on first use.
    ///
    /// The effective scope is the reserved singleton identifier when this
    /// provider is flagged singleton, the supplied identifier otherwise. If
    /// a teardown for that scope is draining, it is awaited first; a new
    /// build never observes partially-torn-down dependency state. The
    /// reference count is incremented once per successful call, whether the
    /// build was fresh or shared.
    ///
    /// # Errors
    ///
    /// [`Error::Build`] when the factory (or a dependency's build) fails.
    /// Failed builds are never cached; calling `get` again retries.
    pub async fn get(&self, scope: impl Into<ScopeId>) -> Result<Arc<T>> {
        let scope = self.effective_scope(scope.into());
        let erased = self.get_shared(scope).await?;
        erased.downcast::<T>().map_err(|_| Error::TypeMismatch {
            key: self.inner.key.clone(),
        })
    }

    /// Releases one reference for `scope`, destroying the instance when the
    /// count reaches zero.
    ///
    /// The decrement clamps at zero. If holders remain, or the provider was
    /// built with [`disable_dispose_destroy`](ProviderBuilder::disable_dispose_destroy),
    /// nothing else happens. Disposing a scope with no tracked instance is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`Error::Destroy`] when the count reached zero and the destroy
    /// callback failed.
    pub async fn dispose(&self, scope: impl Into<ScopeId>) -> Result<()> {
        let scope = self.effective_scope(scope.into());
        let remaining = self.inner.cache.decrement(&scope);
        if remaining > 0 || self.inner.flags.disable_dispose_destroy {
            debug!(provider = %self.inner.key, %scope, remaining, "disposed, holders remain");
            return Ok(());
        }
        self.destroy_shared(scope).await
    }

    /// Forces teardown for `scope`, bypassing reference counting.
    ///
    /// Concurrent calls for the same scope collapse into one execution of
    /// the destroy callback. After the callback settles, each declared
    /// dependency is *disposed* (not destroyed) for the same scope, so a
    /// shared dependency only tears down once its own count reaches zero.
    /// Bookkeeping for the scope is cleared even when the callback fails;
    /// a subsequent `get` rebuilds from scratch.
    ///
    /// # Errors
    ///
    /// [`Error::Destroy`] when the destroy callback failed.
    pub async fn destroy(&self, scope: impl Into<ScopeId>) -> Result<()> {
        let scope = self.effective_scope(scope.into());
        self.destroy_shared(scope).await
    }

    /// Builds (or joins) the instance for `scope`, runs `f` with it, and
    /// unconditionally disposes the scope afterwards.
    ///
    /// The callback's outcome is what the caller observes: a dispose-side
    /// failure after a successful callback is logged and suppressed.
    pub async fn use_with<R, E, F, Fut>(&self, scope: impl Into<ScopeId>, f: F) -> Result<R, E>
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: std::future::Future<Output = Result<R, E>>,
        E: From<Error>,
    {
        let scope = self.effective_scope(scope.into());
        let instance = self.get(scope.clone()).await?;
        let outcome = f(instance).await;
        if let Err(err) = self.dispose(scope).await {
            if outcome.is_err() {
                debug!(provider = %self.inner.key, error = %err, "dispose failed after callback error");
            } else {
                warn!(provider = %self.inner.key, error = %err, "dispose failed after use");
            }
        }
        outcome
    }

    /// Current live-holder count for `scope` (after singleton collapsing).
    pub fn ref_count(&self, scope: impl Into<ScopeId>) -> usize {
        let scope = self.effective_scope(scope.into());
        self.inner.cache.ref_count(&scope)
    }

    /// Whether an instance (or in-flight build) is cached for `scope`.
    pub fn is_cached(&self, scope: impl Into<ScopeId>) -> bool {
        let scope = self.effective_scope(scope.into());
        self.inner.cache.is_cached(&scope)
    }

    fn effective_scope(&self, scope: ScopeId) -> ScopeId {
        if self.inner.flags.singleton {
            ScopeId::singleton()
        } else {
            scope
        }
    }

    async fn get_shared(&self, scope: ScopeId) -> Result<ErasedInstance> {
        let span = info_span!("get", provider = %self.inner.key, %scope);
        async {
            loop {
                let step = self
                    .inner
                    .cache
                    .begin_get(&scope, || Self::make_build(&self.inner, scope.clone()));
                match step {
                    BeginGet::WaitDestroy(destroy) => {
                        debug!("waiting for in-flight destroy");
                        // The destroy's outcome belongs to its own caller.
                        let _ = destroy.await;
                    }
                    BeginGet::Build { build, fresh } => {
                        if !fresh {
                            debug!("joining cached build");
                        }
                        let instance = build.await?;
                        self.inner.cache.increment(&scope);
                        return Ok(instance);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn destroy_shared(&self, scope: ScopeId) -> Result<()> {
        let span = info_span!("destroy", provider = %self.inner.key, %scope);
        async {
            match self
                .inner
                .cache
                .begin_destroy(&scope, |build| Self::make_destroy(&self.inner, scope.clone(), build))
            {
                Some(destroy) => destroy.await,
                None => {
                    debug!("nothing cached, destroy is a no-op");
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The shared build future for one scope. Installed in the cache before
    /// any await, so every concurrent caller joins the same factory run.
    /// A failed build evicts its own cache entry before settling: all
    /// current waiters observe the error, and the next `get` starts fresh.
    fn make_build(inner: &Arc<ProviderInner<T>>, scope: ScopeId) -> BuildFuture {
        let inner = Arc::clone(inner);
        let span = debug_span!("build", provider = %inner.key, scope = %scope);
        async move {
            let result = Self::run_build(&inner, &scope).await;
            if result.is_err() {
                inner.cache.remove_build(&scope);
            }
            result
        }
        .instrument(span)
        .boxed()
        .shared()
    }

    async fn run_build(inner: &Arc<ProviderInner<T>>, scope: &ScopeId) -> Result<ErasedInstance> {
        let deps = Self::resolve_dependencies(inner, scope).await?;
        debug!("invoking factory");
        match (inner.build)(scope.clone(), deps).await {
            Ok(value) => Ok(Arc::new(value) as ErasedInstance),
            Err(source) => Err(Error::Build {
                key: inner.key.clone(),
                scope: scope.clone(),
                source: Arc::new(source),
            }),
        }
    }

    async fn resolve_dependencies(
        inner: &Arc<ProviderInner<T>>,
        scope: &ScopeId,
    ) -> Result<Deps> {
        if inner.dependencies.is_empty() {
            return Ok(Deps::empty(inner.key.clone()));
        }
        let resolver = Self::resolver(inner)?;
        let handles = resolver.resolve_map(&inner.dependencies)?;
        let builds = handles.into_iter().map(|(name, handle)| {
            let scope = scope.clone();
            async move { Ok::<_, Error>((name, handle.get_erased(scope).await?)) }
        });
        let resolved = try_join_all(builds).await?;
        Ok(Deps::new(inner.key.clone(), resolved.into_iter().collect()))
    }

    /// The shared destroy future for one scope. Waits for the cached build
    /// to settle, runs the destroy callback, releases each declared
    /// dependency, and clears the scope's bookkeeping last, even when the
    /// callback failed.
    fn make_destroy(
        inner: &Arc<ProviderInner<T>>,
        scope: ScopeId,
        build: BuildFuture,
    ) -> DestroyFuture {
        let inner = Arc::clone(inner);
        let span = debug_span!("teardown", provider = %inner.key, scope = %scope);
        async move {
            let result = match build.await {
                Ok(instance) => Self::run_destroy(&inner, &scope, instance).await,
                // The build failed on its own; there is no instance to tear down.
                Err(_) => Ok(()),
            };
            inner.cache.clear_scope(&scope);
            result
        }
        .instrument(span)
        .boxed()
        .shared()
    }

    async fn run_destroy(
        inner: &Arc<ProviderInner<T>>,
        scope: &ScopeId,
        instance: ErasedInstance,
    ) -> Result<()> {
        let callback = match &inner.destroy {
            Some(destroy) => {
                let typed = instance.downcast::<T>().map_err(|_| Error::TypeMismatch {
                    key: inner.key.clone(),
                })?;
                debug!("invoking destroy callback");
                (destroy)(scope.clone(), typed)
                    .await
                    .map_err(|source| Error::Destroy {
                        key: inner.key.clone(),
                        scope: scope.clone(),
                        source: Arc::new(source),
                    })
            }
            None => Ok(()),
        };
        let released = Self::release_dependencies(inner, scope).await;
        callback.and(released)
    }

    /// Disposes (never destroys) each declared dependency for `scope`,
    /// propagating reference-count decrements down the graph. Keeps going
    /// past failures and reports the first one.
    async fn release_dependencies(inner: &Arc<ProviderInner<T>>, scope: &ScopeId) -> Result<()> {
        if inner.dependencies.is_empty() {
            return Ok(());
        }
        let resolver = Self::resolver(inner)?;
        let handles = resolver.resolve_map(&inner.dependencies)?;
        let mut first_err = None;
        for (name, handle) in handles {
            if let Err(err) = handle.dispose_erased(scope.clone()).await {
                warn!(dependency = %name, error = %err, "failed to release dependency");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn resolver(inner: &ProviderInner<T>) -> Result<Arc<dyn Resolver>> {
        inner
            .resolver
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(Error::ResolverNotInitialized)
    }
}

#[async_trait::async_trait]
impl<T: Send + Sync + 'static> ProviderHandle for Provider<T> {
    fn key(&self) -> &Key {
        &self.inner.key
    }

    fn dependencies(&self) -> &[(String, Key)] {
        &self.inner.dependencies
    }

    fn is_singleton(&self) -> bool {
        self.inner.flags.singleton
    }

    fn is_eager(&self) -> bool {
        self.inner.flags.eager
    }

    fn is_hidden(&self) -> bool {
        self.inner.flags.hidden
    }

    fn dispose_destroy_disabled(&self) -> bool {
        self.inner.flags.disable_dispose_destroy
    }

    async fn get_erased(&self, scope: ScopeId) -> Result<ErasedInstance> {
        let scope = self.effective_scope(scope);
        self.get_shared(scope).await
    }

    async fn dispose_erased(&self, scope: ScopeId) -> Result<()> {
        self.dispose(scope).await
    }

    async fn destroy_erased(&self, scope: ScopeId) -> Result<()> {
        self.destroy(scope).await
    }

    fn attach_resolver(&self, resolver: Weak<dyn Resolver>) {
        *self.inner.resolver.write() = Some(resolver);
    }
}

/// Builder for [`Provider`]. Declaration order of
/// [`dependency`](ProviderBuilder::dependency) calls is preserved.
///
/// The flag methods mirror what the registry generator extracts from source,
/// so a builder chain is also a provider *declaration* as far as
/// `provident generate` is concerned.
pub struct ProviderBuilder<T> {
    key: Key,
    dependencies: Vec<(String, Key)>,
    flags: Flags,
    destroy: Option<DestroyFn<T>>,
}

impl<T: Send + Sync + 'static> ProviderBuilder<T> {
    fn new(key: Key) -> Self {
        Self {
            key,
            dependencies: Vec::new(),
            flags: Flags::default(),
            destroy: None,
        }
    }

    /// Declares a dependency: the factory will receive, under `name`, the
    /// instance the provider registered at `key` returns for the same
    /// effective scope.
    pub fn dependency(mut self, name: impl Into<String>, key: impl Into<Key>) -> Self {
        self.dependencies.push((name.into(), key.into()));
        self
    }

    /// Collapses every scope identifier to the reserved singleton one.
    pub fn singleton(mut self) -> Self {
        self.flags.singleton = true;
        self
    }

    /// Marks this provider for proactive construction by
    /// [`Registry::startup`](crate::Registry::startup).
    pub fn eager(mut self) -> Self {
        self.flags.eager = true;
        self
    }

    /// Excludes this key from the generated public surface. The provider is
    /// still registered and resolvable.
    pub fn hidden(mut self) -> Self {
        self.flags.hidden = true;
        self
    }

    /// Makes `dispose` decrement-only: the destroy callback never runs on
    /// a dispose, only on an explicit `destroy`.
    pub fn disable_dispose_destroy(mut self) -> Self {
        self.flags.disable_dispose_destroy = true;
        self
    }

    /// Sets the optional async destroy callback, invoked with the scope and
    /// the instance when the scope tears down.
    pub fn on_destroy<F, Fut>(mut self, destroy: F) -> Self
    where
        F: Fn(ScopeId, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.destroy = Some(Box::new(move |scope, instance| {
            destroy(scope, instance).boxed()
        }));
        self
    }

    /// Finishes the builder with the async factory and returns the
    /// provider. The factory is invoked with the effective scope and the
    /// resolved dependencies, at most once per scope identifier.
    pub fn build<F, Fut>(self, build: F) -> Provider<T>
    where
        F: Fn(ScopeId, Deps) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Provider {
            inner: Arc::new(ProviderInner {
                key: self.key,
                dependencies: self.dependencies,
                flags: self.flags,
                build: Box::new(move |scope, deps| build(scope, deps).boxed()),
                destroy: self.destroy,
                cache: ScopeCache::default(),
                resolver: RwLock::new(None),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counter_provider(builds: Arc<AtomicU32>) -> Provider<u32> {
        Provider::builder("counter").build(move |_scope, _deps| {
            let builds = Arc::clone(&builds);
            async move { Ok(builds.fetch_add(1, Ordering::SeqCst) + 1) }
        })
    }

    #[tokio::test]
    async fn caches_per_scope() {
        let builds = Arc::new(AtomicU32::new(0));
        let provider = counter_provider(Arc::clone(&builds));

        assert_eq!(*provider.get("x").await.unwrap(), 1);
        assert_eq!(*provider.get("x").await.unwrap(), 1);
        assert_eq!(*provider.get("y").await.unwrap(), 2);
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn singleton_collapses_scopes() {
        let builds = Arc::new(AtomicU32::new(0));
        let provider = Provider::builder("one")
            .singleton()
            .build(move |_scope, _deps| {
                let builds = Arc::clone(&builds);
                async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                }
            });

        let a = provider.get("a").await.unwrap();
        let b = provider.get("b").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.ref_count("anything"), 2);
    }

    #[tokio::test]
    async fn failed_build_is_not_cached() {
        let attempts = Arc::new(AtomicU32::new(0));
        let provider = Provider::builder("flaky").build({
            let attempts = Arc::clone(&attempts);
            move |_scope, _deps| {
                let attempts = Arc::clone(&attempts);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        anyhow::bail!("first attempt fails");
                    }
                    Ok(42u32)
                }
            }
        });

        assert!(matches!(
            provider.get("s").await,
            Err(Error::Build { .. })
        ));
        assert!(!provider.is_cached("s"));
        assert_eq!(*provider.get("s").await.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
