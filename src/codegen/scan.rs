//! Regex-based provider discovery over a Rust source tree.
//!
//! The scanner extracts `Provider::builder("…")` chains from public
//! zero-argument functions. It is deliberately lexical: no syntax tree is
//! built, which keeps generation fast and dependency-free; anything it
//! cannot see (macro-generated builders, conditional chains) belongs in a
//! custom [`Discovery`](crate::codegen::Discovery) implementation.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::codegen::decl::{Discovery, ProviderDecl};
use crate::error::GenerateError;

struct Patterns {
    builder: Regex,
    function: Regex,
    dependency: Regex,
    singleton: Regex,
    eager: Regex,
    hidden: Regex,
    disable_dispose_destroy: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            builder: Regex::new(r#"Provider\s*::\s*builder\s*\(\s*"([^"]+)"\s*\)"#)
                .expect("static pattern"),
            function: Regex::new(
                r"pub\s+fn\s+([A-Za-z0-9_]+)\s*\(\s*\)\s*->\s*Provider\s*<\s*([^>]+)\s*>",
            )
            .expect("static pattern"),
            dependency: Regex::new(r#"\.\s*dependency\s*\(\s*"([^"]+)"\s*,\s*"([^"]+)"\s*\)"#)
                .expect("static pattern"),
            singleton: Regex::new(r"\.\s*singleton\s*\(\s*\)").expect("static pattern"),
            eager: Regex::new(r"\.\s*eager\s*\(\s*\)").expect("static pattern"),
            hidden: Regex::new(r"\.\s*hidden\s*\(\s*\)").expect("static pattern"),
            disable_dispose_destroy: Regex::new(r"\.\s*disable_dispose_destroy\s*\(\s*\)")
                .expect("static pattern"),
        }
    }
}

/// The shipped [`Discovery`](crate::codegen::Discovery) implementation:
/// walks `**/*.rs` under a root, skipping `target`, hidden directories, and
/// any explicitly excluded file (the generated artifact itself, so a
/// previous run's output never feeds the next run's input).
///
/// Declaration order is path order (sorted) then in-file offset order; it is
/// stable for an unchanged tree.
pub struct SourceScanner {
    skip_dirs: Vec<String>,
    exclude_files: Vec<PathBuf>,
    patterns: Patterns,
}

impl Default for SourceScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceScanner {
    /// A scanner that skips `target/` and hidden directories.
    pub fn new() -> Self {
        Self {
            skip_dirs: vec!["target".to_owned()],
            exclude_files: Vec::new(),
            patterns: Patterns::new(),
        }
    }

    /// Additionally skips directories with this name anywhere in the tree.
    pub fn skip_dir(mut self, name: impl Into<String>) -> Self {
        self.skip_dirs.push(name.into());
        self
    }

    /// Excludes a file from scanning. Relative paths match by suffix, so
    /// `src/providers_gen.rs` works regardless of the walk root.
    pub fn exclude_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude_files.push(path.into());
        self
    }

    fn is_skipped_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.skip_dirs.iter().any(|skip| skip == name)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_files.iter().any(|exclude| {
            if exclude.is_absolute() {
                path == exclude
            } else {
                path.ends_with(exclude)
            }
        })
    }

    /// Extracts every declaration from one source text. `module_path` is
    /// the `crate::…` path the file's items are reachable under.
    fn scan_source(&self, source: &str, module_path: &str) -> Vec<ProviderDecl> {
        let mut decls = Vec::new();
        for builder in self.patterns.builder.captures_iter(source) {
            let whole = builder.get(0).expect("capture 0 always present");
            let key = &builder[1];

            // The declaration is the nearest enclosing public constructor.
            let Some(function) = self
                .patterns
                .function
                .captures_iter(&source[..whole.start()])
                .last()
            else {
                trace!(key, "builder chain outside a public constructor, skipped");
                continue;
            };

            let chain_start = whole.end();
            let Some(chain_len) = source[chain_start..].find(".build(") else {
                trace!(key, "builder chain never calls build, skipped");
                continue;
            };
            let chain = &source[chain_start..chain_start + chain_len];

            let dependencies = self
                .patterns
                .dependency
                .captures_iter(chain)
                .map(|dep| (dep[1].to_owned(), dep[2].to_owned()))
                .collect();

            decls.push(ProviderDecl {
                key: key.to_owned(),
                constructor: format!("{module_path}::{}", &function[1]),
                instance_type: qualify_type(function[2].trim(), module_path),
                dependencies,
                singleton: self.patterns.singleton.is_match(chain),
                eager: self.patterns.eager.is_match(chain),
                hidden: self.patterns.hidden.is_match(chain),
                disable_dispose_destroy: self.patterns.disable_dispose_destroy.is_match(chain),
            });
        }
        decls
    }
}

impl Discovery for SourceScanner {
    fn discover(&self, root: &Path) -> Result<Vec<ProviderDecl>, GenerateError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && entry.depth() > 0 && self.is_skipped_dir(&name))
        });
        for entry in walker {
            let entry = entry.map_err(|err| GenerateError::Discovery(err.to_string()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == "rs")
                && !self.is_excluded(path)
            {
                files.push(path.to_owned());
            }
        }
        files.sort();

        let mut decls = Vec::new();
        for path in files {
            let source = fs::read_to_string(&path)?;
            let module_path = module_path_for(&path, root);
            let found = self.scan_source(&source, &module_path);
            if !found.is_empty() {
                debug!(file = %path.display(), declarations = found.len(), "scanned");
            }
            decls.extend(found);
        }
        Ok(decls)
    }
}

/// Derives the `crate::…` path of a file's items from its location:
/// `src/db.rs` → `crate::db`, `src/db/mod.rs` → `crate::db`, `src/lib.rs`
/// and `src/main.rs` → `crate`.
fn module_path_for(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.first().map(String::as_str) == Some("src") {
        segments.remove(0);
    }
    if let Some(last) = segments.last_mut() {
        *last = last.trim_end_matches(".rs").to_owned();
    }
    match segments.last().map(String::as_str) {
        Some("mod") | Some("lib") | Some("main") => {
            segments.pop();
        }
        _ => {}
    }
    let mut module = String::from("crate");
    for segment in segments {
        module.push_str("::");
        module.push_str(&segment);
    }
    module
}

/// Best-effort qualification of the scanned instance type: already-qualified
/// paths pass through, a bare local type name is rooted at the declaring
/// module, anything else (generics, primitives) is dropped rather than
/// guessed wrong.
fn qualify_type(raw: &str, module_path: &str) -> Option<String> {
    if raw.contains("::") {
        return Some(raw.to_owned());
    }
    let is_plain = raw.chars().next().is_some_and(char::is_uppercase)
        && raw.chars().all(|c| c.is_alphanumeric() || c == '_');
    if is_plain {
        Some(format!("{module_path}::{raw}"))
    } else {
        None
    }
}
