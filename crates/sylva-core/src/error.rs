//! Error types for local analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Reasons a file yields no fact bundle.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported language for {0}")]
    UnsupportedLanguage(PathBuf),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("syntax error in {file} at {line}:{column}")]
    Syntax { file: String, line: u32, column: u32 },

    #[error("{file} nests deeper than {limit} levels")]
    TooDeep { file: String, limit: usize },
}

impl AnalyzeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short category used in run reports.
    pub fn category(&self) -> &'static str {
        match self {
            AnalyzeError::Io { .. } => "io",
            AnalyzeError::UnsupportedLanguage(_) => "unsupported_language",
            AnalyzeError::Parser(_) => "parser",
            AnalyzeError::Syntax { .. } => "syntax",
            AnalyzeError::TooDeep { .. } => "too_deep",
        }
    }
}
