//! Error types for the engine.

use std::path::PathBuf;
use sylva_graph::StoreError;
use thiserror::Error;

/// Errors that halt a run before or outside per-file work.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("plugin {plugin} depends on {dependency}, which is unknown or disabled")]
    UnknownDependency { plugin: String, dependency: String },

    #[error("plugin {plugin} ({phase}) depends on {dependency}, which runs in the later phase {dependency_phase}")]
    LaterPhaseDependency {
        plugin: String,
        phase: String,
        dependency: String,
        dependency_phase: String,
    },

    #[error("plugin dependency cycle among: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin {plugin} reported an issue outside the validation phase")]
    IssueOutsideValidation { plugin: String },

    #[error("worker task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
