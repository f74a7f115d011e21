//! Error types for regmirror core operations.
//!
//! This module defines the error types used throughout the `regmirror-core` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`CoreError`] as the error type.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in regmirror core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Manifest file does not exist.
    #[error("Manifest file not found: {}", path.display())]
    ManifestNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Manifest file could not be read or written.
    #[error("Manifest I/O error at {}: {source}", path.display())]
    ManifestIo {
        /// Path to the manifest file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest YAML is malformed.
    #[error("Failed to parse manifest {}: {source}", path.display())]
    ManifestParse {
        /// Path to the manifest file.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Manifest could not be serialized.
    #[error("Failed to serialize manifest: {0}")]
    ManifestSerialize(#[from] serde_yaml::Error),

    /// Report file could not be written.
    #[error("Failed to write report to {}: {source}", path.display())]
    ReportIo {
        /// Path to the report file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Report JSON serialization error.
    #[error("Report serialization error: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}
