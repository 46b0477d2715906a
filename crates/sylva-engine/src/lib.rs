//! Sylva Engine - phased analysis of a workspace
//!
//! This crate drives a workspace through five ordered phases:
//! discovery, indexing, analysis, enrichment and validation. Each phase
//! runs a set of built-in plugins ordered by their declared dependencies
//! and priority. Analysis is the only parallel phase; every file goes
//! through clear, analyze and commit while holding its own lock.
//!
//! Enrichment resolvers add cross-file edges (imports, calls, class
//! hierarchy, argument flow, suppressions). Validators turn graph facts
//! into Issue nodes. Every plugin returns counts and skip reasons, which
//! end up in the [`RunReport`].
//!
//! # Example
//!
//! ```no_run
//! use sylva_engine::{shared, Config, Orchestrator, RunOptions};
//! use sylva_graph::MemoryGraph;
//!
//! # async fn run() -> sylva_engine::Result<()> {
//! let store = shared(Box::new(MemoryGraph::new()));
//! let orchestrator = Orchestrator::new("./my-project", Config::default(), store);
//! let report = orchestrator.run(RunOptions::default()).await?;
//! println!("{} files analyzed, {} issues", report.files_analyzed, report.issues);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod indexing;
pub mod locks;
pub mod orchestrator;
pub mod plugin;
mod plugins;
pub mod progress;
pub mod report;

pub use config::Config;
pub use context::{shared, IssueSpec, PluginContext, Severity, SharedStore};
pub use discovery::{discover, Discovery, SourceFile};
pub use error::{ConfigError, EngineError, Result};
pub use indexing::{content_hash, select_changed, ChangeSet};
pub use locks::FileLocks;
pub use orchestrator::{Orchestrator, RunOptions};
pub use plugin::{plan, Phase, PhasePlan, PluginKind, PluginMetadata};
pub use progress::{NoopProgress, ProgressSink, TracingProgress};
pub use report::{PluginOutcome, PluginReport, RunReport, SkipReason};
