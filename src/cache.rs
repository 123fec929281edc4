//! Per-provider, scope-keyed instance cache.
//!
//! Three parallel maps keyed by scope identifier: in-flight-or-settled build
//! futures, live reference counts, and in-flight destroy futures. All three
//! sit behind one synchronous mutex that is never held across an await, so
//! every read-modify-write on the counts is atomic with respect to the
//! cooperative scheduler.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::deps::ErasedInstance;
use crate::error::Error;
use crate::key::ScopeId;

/// A build shared between every concurrent `get` for one scope. Cloning the
/// future joins the in-flight build instead of starting a second one.
pub(crate) type BuildFuture = Shared<BoxFuture<'static, Result<ErasedInstance, Error>>>;

/// A destroy shared between every concurrent `destroy` for one scope.
pub(crate) type DestroyFuture = Shared<BoxFuture<'static, Result<(), Error>>>;

/// First step of a `get`: either a destroy is draining and must be awaited
/// before anything else, or a build future (fresh or joined) is ready to be
/// awaited.
pub(crate) enum BeginGet {
    WaitDestroy(DestroyFuture),
    Build { build: BuildFuture, fresh: bool },
}

#[derive(Default)]
struct State {
    instances: HashMap<ScopeId, BuildFuture>,
    ref_counts: HashMap<ScopeId, usize>,
    destroying: HashMap<ScopeId, DestroyFuture>,
}

#[derive(Default)]
pub(crate) struct ScopeCache {
    state: Mutex<State>,
}

impl ScopeCache {
    /// Decides, in one critical section, what a `get` for `scope` does next.
    ///
    /// If a destroy is in flight the caller must await it and try again; no
    /// new build may begin until the teardown settles. Otherwise the cached
    /// build is joined, or `make` is invoked to install a fresh one before
    /// anyone can observe the gap.
    pub(crate) fn begin_get(
        &self,
        scope: &ScopeId,
        make: impl FnOnce() -> BuildFuture,
    ) -> BeginGet {
        let mut state = self.state.lock();
        if let Some(destroy) = state.destroying.get(scope) {
            return BeginGet::WaitDestroy(destroy.clone());
        }
        if let Some(build) = state.instances.get(scope) {
            return BeginGet::Build {
                build: build.clone(),
                fresh: false,
            };
        }
        let build = make();
        state.instances.insert(scope.clone(), build.clone());
        BeginGet::Build { build, fresh: true }
    }

    /// Joins the in-flight destroy for `scope`, or installs the one produced
    /// by `make` (which receives the cached build so it can settle first).
    /// Returns `None` when nothing is cached: destroy is then a no-op.
    pub(crate) fn begin_destroy(
        &self,
        scope: &ScopeId,
        make: impl FnOnce(BuildFuture) -> DestroyFuture,
    ) -> Option<DestroyFuture> {
        let mut state = self.state.lock();
        if let Some(destroy) = state.destroying.get(scope) {
            return Some(destroy.clone());
        }
        let build = state.instances.get(scope)?.clone();
        let destroy = make(build);
        state.destroying.insert(scope.clone(), destroy.clone());
        Some(destroy)
    }

    /// Evicts a failed build so the next `get` retries from scratch.
    pub(crate) fn remove_build(&self, scope: &ScopeId) {
        self.state.lock().instances.remove(scope);
    }

    /// Increments the live-holder count for `scope` by one.
    pub(crate) fn increment(&self, scope: &ScopeId) -> usize {
        let mut state = self.state.lock();
        let count = state.ref_counts.entry(scope.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Decrements the live-holder count for `scope`, clamped at zero, and
    /// returns the new count. An untracked scope stays untracked.
    pub(crate) fn decrement(&self, scope: &ScopeId) -> usize {
        let mut state = self.state.lock();
        match state.ref_counts.get_mut(scope) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        }
    }

    /// Removes the scope from all three maps. Called once per teardown,
    /// whether or not the destroy callback succeeded.
    pub(crate) fn clear_scope(&self, scope: &ScopeId) {
        let mut state = self.state.lock();
        state.instances.remove(scope);
        state.ref_counts.remove(scope);
        state.destroying.remove(scope);
    }

    /// Current live-holder count for `scope`.
    pub(crate) fn ref_count(&self, scope: &ScopeId) -> usize {
        self.state.lock().ref_counts.get(scope).copied().unwrap_or(0)
    }

    /// Whether a build (in flight or settled) is cached for `scope`.
    pub(crate) fn is_cached(&self, scope: &ScopeId) -> bool {
        self.state.lock().instances.contains_key(scope)
    }

    /// Scopes with a cached build, unordered.
    pub(crate) fn cached_scopes(&self) -> Vec<ScopeId> {
        self.state.lock().instances.keys().cloned().collect()
    }
}
