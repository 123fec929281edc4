//! Object-safe, type-erased provider surface.

use std::sync::Weak;

use async_trait::async_trait;

use crate::deps::ErasedInstance;
use crate::error::Result;
use crate::key::{Key, ScopeId};
use crate::traits::Resolver;

/// The type-erased face of a [`Provider`](crate::Provider).
///
/// Registries store providers in this form, and dependency recursion runs
/// through it: when a provider builds, each declared dependency is resolved
/// to a `ProviderHandle` and its [`get_erased`](ProviderHandle::get_erased)
/// is invoked with the same effective scope. Typed access stays on
/// [`Provider<T>`](crate::Provider) itself.
///
/// Scope collapsing happens inside the handle: passing any scope to a
/// singleton provider's methods operates on the reserved identifier.
#[async_trait]
pub trait ProviderHandle: Send + Sync {
    /// Stable logical identifier of this provider.
    fn key(&self) -> &Key;

    /// Declared dependencies: local parameter name → referenced key, in
    /// declaration order.
    fn dependencies(&self) -> &[(String, Key)];

    /// Whether every scope identifier collapses to the reserved one.
    fn is_singleton(&self) -> bool;

    /// Whether the startup helper should build this provider proactively.
    fn is_eager(&self) -> bool;

    /// Whether the generator excludes this key from the emitted surface.
    fn is_hidden(&self) -> bool;

    /// Whether `dispose` only decrements, never triggering destroy logic.
    fn dispose_destroy_disabled(&self) -> bool;

    /// Builds or joins the instance for `scope` and increments its
    /// reference count. See [`Provider::get`](crate::Provider::get).
    async fn get_erased(&self, scope: ScopeId) -> Result<ErasedInstance>;

    /// Decrements the reference count for `scope`, destroying on zero.
    /// See [`Provider::dispose`](crate::Provider::dispose).
    async fn dispose_erased(&self, scope: ScopeId) -> Result<()>;

    /// Forces teardown for `scope`, bypassing reference counting.
    /// See [`Provider::destroy`](crate::Provider::destroy).
    async fn destroy_erased(&self, scope: ScopeId) -> Result<()>;

    /// Installs the resolver this provider resolves its dependencies
    /// through. Called by [`RegistryBuilder::build`](crate::RegistryBuilder::build);
    /// the slot may be reassigned at any time, which is how tests
    /// substitute a stub.
    fn attach_resolver(&self, resolver: Weak<dyn Resolver>);
}

impl std::fmt::Debug for dyn ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("key", &self.key())
            .field("dependencies", &self.dependencies())
            .finish_non_exhaustive()
    }
}
