//! Error types for the CLI

use core_types::GcError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Collector or graph error
    #[error("collector error: {0}")]
    Gc(#[from] GcError),

    /// File I/O error
    #[error("file error at '{path}': {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[error("invalid config file '{path}': {source}")]
    ConfigParse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Configuration values are inconsistent
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Report serialization failed
    #[error("could not serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
