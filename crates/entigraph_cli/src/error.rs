//! CLI error type.

use entigraph_core::MappingError;
use entigraph_service::ServiceError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The fixture file could not be read.
    #[error("cannot read fixtures {path:?}: {source}")]
    Fixtures {
        /// Path given on the command line.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The resource has no service.
    #[error("unknown resource `{0}` (expected campuses, users, units or projects)")]
    UnknownResource(String),

    /// A `--filter` argument was not `key=value`.
    #[error("invalid filter `{0}`, expected key=value")]
    InvalidFilter(String),

    /// A service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Decoding or encoding failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Output could not be rendered.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
