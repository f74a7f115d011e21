//! Error types for the sync crate.

use std::path::PathBuf;

use regmirror_core::CoreError;
use regmirror_registry::RegistryError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Stderr fragments that indicate registry rate limiting (matched lowercase).
const RATE_LIMIT_MARKERS: [&str; 3] = ["toomanyrequests", "rate limit", "429"];

/// Errors that can occur while resolving or mirroring images.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The copy tool exited unsuccessfully.
    #[error("copy of '{source_ref}' to '{target}' failed (exit {}): {stderr}", exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    CopyFailed {
        /// Source reference.
        source_ref: String,
        /// Target reference.
        target: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The copy did not finish in time.
    #[error("copy of '{source_ref}' timed out after {timeout_secs}s")]
    CopyTimeout {
        /// Source reference.
        source_ref: String,
        /// Timeout in seconds.
        timeout_secs: u64,
    },

    /// The tool binary could not be started.
    #[error("failed to run '{}': {source}", program.display())]
    ToolSpawn {
        /// Program path.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for invalidity.
        reason: String,
    },

    /// Manifest or report error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SyncError {
    /// Returns true if the failure looks like registry rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::CopyFailed { stderr, .. } => {
                let lower = stderr.to_lowercase();
                RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy_failed(stderr: &str) -> SyncError {
        SyncError::CopyFailed {
            source_ref: "nginx:1.25".to_string(),
            target: "ghcr.io/acme/nginx:1.25".to_string(),
            exit_code: Some(1),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = copy_failed("boom");
        assert_eq!(
            err.to_string(),
            "copy of 'nginx:1.25' to 'ghcr.io/acme/nginx:1.25' failed (exit 1): boom"
        );
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(copy_failed("TOOMANYREQUESTS: pull limit").is_rate_limited());
        assert!(copy_failed("Rate Limit exceeded").is_rate_limited());
        assert!(copy_failed("status 429").is_rate_limited());
        assert!(!copy_failed("manifest unknown").is_rate_limited());
    }
}
