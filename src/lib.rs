//! # provident
//!
//! Lifecycle-managed provider runtime with ahead-of-time registry
//! generation and dependency-cycle detection.
//!
//! ## Features
//!
//! - **Scope-keyed caching**: one instance per provider per scope
//!   identifier, with singletons collapsing every scope to a shared one
//! - **Build deduplication**: unbounded concurrent `get` calls for one
//!   scope share a single factory invocation; the in-flight build is
//!   shared before it settles, not merely cached after
//! - **Reference-counted teardown**: `dispose` releases one holder;
//!   destroy logic runs exactly once, when the last holder lets go
//! - **Coordinated destruction**: a `get` racing an in-flight `destroy`
//!   waits for the teardown and rebuilds; concurrent destroys collapse
//! - **Injected resolution**: providers resolve their declared
//!   dependencies through an attached [`Resolver`]: generated code
//!   installs the real registry, tests attach stubs
//! - **Ahead-of-time checking**: the `provident` binary scans for provider
//!   declarations, rejects dependency cycles before anything runs, and
//!   emits a typed registry module
//!
//! ## Quick start
//!
//! ```rust
//! use provident::{Provider, RegistryBuilder};
//!
//! struct Config { url: String }
//! struct Database { url: String }
//!
//! fn config() -> Provider<Config> {
//!     Provider::builder("config")
//!         .singleton()
//!         .build(|_scope, _deps| async {
//!             Ok(Config { url: "postgres://localhost".into() })
//!         })
//! }
//!
//! fn database() -> Provider<Database> {
//!     Provider::builder("database")
//!         .dependency("cfg", "config")
//!         .build(|_scope, deps| async move {
//!             let cfg = deps.get::<Config>("cfg")?;
//!             Ok(Database { url: cfg.url.clone() })
//!         })
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> provident::Result<()> {
//! let db = database();
//! let _registry = RegistryBuilder::new()
//!     .register(config())
//!     .register(db.clone())
//!     .build();
//!
//! let instance = db.get("request-1").await?;
//! assert_eq!(instance.url, "postgres://localhost");
//! db.dispose("request-1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Scopes
//!
//! Every lifecycle operation takes a scope identifier. Two calls with the
//! same identifier share one instance; different identifiers build
//! independently. A provider flagged [`singleton`](ProviderBuilder::singleton)
//! collapses every identifier to the reserved [`ScopeId::singleton`], which
//! is also what [`ScopeId::default`] resolves to when a caller has no scope
//! of its own.
//!
//! ## Generated registries
//!
//! `provident generate` walks the source tree for `Provider::builder`
//! declarations, builds the dependency graph, aborts on cycles, and writes
//! a module exposing `keys` constants, `types` aliases, `install()` and an
//! eager `startup()`; see the [`codegen`] module for the pipeline pieces.

mod cache;
mod deps;
mod error;
mod key;
mod provider;
mod registry;
mod traits;

pub mod cli;
pub mod codegen;
pub mod compose;

pub use compose::{provider, providers, use_providers, Instances};
pub use deps::{Deps, ErasedInstance};
pub use error::{Cycle, Error, GenerateError, Result};
pub use key::{Key, ScopeId, SINGLETON_SCOPE};
pub use provider::{Provider, ProviderBuilder};
pub use registry::{Registry, RegistryBuilder};
pub use traits::{ProviderHandle, Resolver};
