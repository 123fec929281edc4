//! Command-line surface: `generate` runs the pipeline once, `watch` re-runs
//! it on file-system changes until interrupted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::codegen::{generate, GenerateReport, SourceScanner};
use crate::error::GenerateError;

/// Default location of the generated registry module.
pub const DEFAULT_OUTPUT: &str = "src/providers_gen.rs";

/// Quiet window after a file-system event before regenerating.
const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "provident", version, about = "Provider registry generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the current directory and write the registry module.
    Generate {
        /// Where to write the generated module.
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
    },
    /// Generate once, then regenerate on every source change.
    Watch {
        /// Where to write the generated module.
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
    },
}

/// One generation run rooted at `root`, excluding the output artifact from
/// its own input.
pub fn generate_once(root: &Path, output: &Path) -> Result<GenerateReport, GenerateError> {
    let scanner = SourceScanner::new().exclude_file(output);
    generate(root, output, &scanner)
}

/// Prints a generation failure. Cycles get one dedicated line each; the
/// exact wording (typo included) is load-bearing, downstream scripts match
/// on it.
pub fn report_failure(err: &GenerateError) {
    match err {
        GenerateError::Cycles(cycles) => {
            for cycle in cycles {
                eprintln!("Cicle depenendecy: {cycle}");
            }
        }
        other => eprintln!("error: {other}"),
    }
}

/// Runs `generate` once, then re-runs it (debounced) on every change under
/// `root` until ctrl-c. Events for the output artifact itself and for
/// `target/` are ignored, so a run never retriggers itself.
pub async fn watch(root: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    // Event paths arrive absolute; anchor the ignore prefixes the same way.
    let root = root.canonicalize()?;
    match generate_once(&root, &output) {
        Ok(report) => info!(providers = report.providers, "initial generation complete"),
        Err(err) => {
            report_failure(&err);
            warn!("initial generation failed, watching for fixes");
        }
    }

    let (tx, mut rx) = mpsc::channel(16);
    let ignore_output = root.join(&output);
    let ignore_target = root.join("target");
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| {
            let Ok(event) = result else { return };
            let relevant = event.paths.iter().any(|path| {
                !path.starts_with(&ignore_output) && !path.starts_with(&ignore_target)
            });
            if relevant && (event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove())
            {
                let _ = tx.blocking_send(());
            }
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "watching for changes");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.recv() => {
                if changed.is_none() {
                    break;
                }
                debounce(&mut rx).await;
                match generate_once(&root, &output) {
                    Ok(report) => info!(providers = report.providers, "registry regenerated"),
                    Err(err) => {
                        report_failure(&err);
                        error!("generation failed, watching for fixes");
                    }
                }
            }
        }
    }

    info!("watcher closed");
    Ok(())
}

/// Drains further change events until the tree has been quiet for the
/// debounce window.
async fn debounce(rx: &mut mpsc::Receiver<()>) {
    loop {
        match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
            Ok(Some(())) => continue,
            Ok(None) | Err(_) => break,
        }
    }
}
