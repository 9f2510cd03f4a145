// src/error.rs

use crate::resolver::ResolveError;
use thiserror::Error;

/// Core error types for aptlock
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network failure or non-success HTTP status while fetching
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Corrupt compressed stream or malformed index paragraph
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration contents
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// YAML (de)serialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Distribution name not in the known codename table
    #[error("Unknown distribution: {0}")]
    UnknownDistribution(String),

    /// Architecture name not supported
    #[error("Unknown architecture: {0}")]
    UnknownArchitecture(String),

    /// Snapshots file has no entry for a channel that is needed
    #[error("No snapshot configured for '{0}'")]
    MissingSnapshot(String),

    /// The mirror did not expose a usable snapshot
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// Resolution failed for one (distribution, architecture) target
    #[error("Failed to resolve for {distro}/{arch}: {source}")]
    Resolve {
        distro: String,
        arch: String,
        #[source]
        source: ResolveError,
    },
}

/// Result type alias using aptlock's Error type
pub type Result<T> = std::result::Result<T, Error>;
