//! The injected resolution capability.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::key::Key;
use crate::traits::ProviderHandle;

/// Maps logical keys to provider handles.
///
/// This is the seam between the runtime and the generated registry: the
/// registry produced by `provident generate` implements it (via
/// [`Registry`](crate::Registry)), and every provider resolves its declared
/// dependencies through whichever implementation was attached to it. Tests
/// substitute a stub by attaching their own implementation; no process
/// globals are involved.
pub trait Resolver: Send + Sync {
    /// Resolves a single key to its provider handle.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`](crate::Error::KeyNotFound) when no provider is
    /// registered under `key`.
    fn resolve(&self, key: &Key) -> Result<Arc<dyn ProviderHandle>>;

    /// Resolves a batch of `(local name, key)` pairs in one call, preserving
    /// order. Fails on the first unknown key.
    fn resolve_map(
        &self,
        names: &[(String, Key)],
    ) -> Result<Vec<(String, Arc<dyn ProviderHandle>)>> {
        names
            .iter()
            .map(|(name, key)| Ok((name.clone(), self.resolve(key)?)))
            .collect()
    }
}

/// A fixed name → handle mapping, useful as a test stub.
impl Resolver for HashMap<Key, Arc<dyn ProviderHandle>> {
    fn resolve(&self, key: &Key) -> Result<Arc<dyn ProviderHandle>> {
        self.get(key)
            .cloned()
            .ok_or_else(|| crate::error::Error::KeyNotFound { key: key.clone() })
    }
}
