//! Ahead-of-time registry generation: discover provider declarations in
//! source, check the dependency graph, and emit the registry module.
//!
//! Discovery is an injected capability ([`Discovery`]) so the graph and
//! emission logic stay independent of any particular parser; the shipped
//! implementation is [`SourceScanner`].

mod decl;
mod emit;
mod graph;
mod scan;

pub use decl::{Discovery, ProviderDecl};
pub use graph::DependencyGraph;
pub use scan::SourceScanner;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::GenerateError;

/// Outcome of a successful generation run.
#[derive(Debug, Clone)]
pub struct GenerateReport {
    /// Number of provider declarations discovered.
    pub providers: usize,
    /// Where the registry module was written.
    pub output: PathBuf,
}

/// Runs the full pipeline: discover under `root`, build the dependency
/// graph, fail on cycles or dangling references, render and write the
/// registry module to `output`.
///
/// Nothing is written when the check fails, so a broken graph never replaces
/// a previously generated artifact.
///
/// # Errors
///
/// [`GenerateError::Cycles`] with every recorded cycle,
/// [`GenerateError::UnknownDependency`] for a dangling reference, or an
/// I/O error from discovery or the final write.
pub fn generate(
    root: &Path,
    output: &Path,
    discovery: &dyn Discovery,
) -> Result<GenerateReport, GenerateError> {
    let decls = discovery.discover(root)?;
    debug!(providers = decls.len(), "declarations discovered");

    let graph = DependencyGraph::from_decls(&decls);
    let cycles = graph.find_cycles();
    if !cycles.is_empty() {
        return Err(GenerateError::Cycles(cycles));
    }
    if let Some((from, name, to)) = graph.first_unknown_dependency() {
        return Err(GenerateError::UnknownDependency { from, name, to });
    }

    let rendered = emit::render(&decls);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output, rendered)?;
    info!(providers = decls.len(), output = %output.display(), "registry generated");

    Ok(GenerateReport {
        providers: decls.len(),
        output: output.to_owned(),
    })
}
