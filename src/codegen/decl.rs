//! Provider declarations as extracted from source, and the discovery seam.

use std::path::Path;

use crate::error::GenerateError;

/// One provider declaration, as discovered in source.
///
/// `constructor` is the path of the zero-argument function returning the
/// provider (e.g. `crate::db::database`); `instance_type`, when the scanner
/// could determine it, is the path of the managed value's type and feeds the
/// generated `types` module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDecl {
    /// Logical key of the provider.
    pub key: String,
    /// Path of the constructor function, rooted at `crate`.
    pub constructor: String,
    /// Path of the instance type, when statically determinable.
    pub instance_type: Option<String>,
    /// Declared dependencies: local name → referenced key, in order.
    pub dependencies: Vec<(String, String)>,
    /// Collapses every scope to the reserved singleton identifier.
    pub singleton: bool,
    /// Built proactively by the generated startup function.
    pub eager: bool,
    /// Excluded from the generated `keys`/`types` surface.
    pub hidden: bool,
    /// `dispose` never triggers destroy logic.
    pub disable_dispose_destroy: bool,
}

impl ProviderDecl {
    /// A declaration with the given key and constructor and nothing else.
    pub fn new(key: impl Into<String>, constructor: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            constructor: constructor.into(),
            instance_type: None,
            dependencies: Vec::new(),
            singleton: false,
            eager: false,
            hidden: false,
            disable_dispose_destroy: false,
        }
    }

    /// Adds a dependency, preserving declaration order.
    pub fn with_dependency(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.dependencies.push((name.into(), key.into()));
        self
    }
}

/// Produces provider declarations from a source tree.
///
/// The generation pipeline only ever sees this trait; swapping the shipped
/// regex scanner for a syntax-tree-based one (or a fixed list in tests)
/// requires no changes to graph checking or emission.
pub trait Discovery {
    /// Discovers every provider declaration under `root`, in a
    /// deterministic order that becomes the registry's declaration order.
    fn discover(&self, root: &Path) -> Result<Vec<ProviderDecl>, GenerateError>;
}

/// A fixed set of declarations; the natural test double.
impl Discovery for Vec<ProviderDecl> {
    fn discover(&self, _root: &Path) -> Result<Vec<ProviderDecl>, GenerateError> {
        Ok(self.clone())
    }
}
