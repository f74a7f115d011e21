//! Mirror outcome records and the JSON report.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};

/// One confirmed mirror outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Image name (repository without tag).
    pub name: String,

    /// Source reference.
    pub source: String,

    /// Target reference.
    pub target: String,

    /// Mirrored tag.
    pub version: String,

    /// Description from the manifest.
    pub description: String,

    /// Repository name under the destination owner.
    pub repository: String,

    /// RFC 3339 time the outcome was confirmed.
    pub synced_at: String,

    /// Manifest digest, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Image creation time reported by the destination registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Aggregate result of a mirroring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// RFC 3339 generation time.
    pub updated_at: String,

    /// Destination registry host.
    pub registry: String,

    /// Destination namespace owner.
    pub owner: String,

    /// Tasks attempted.
    pub total_count: usize,

    /// Successful tasks.
    pub success_count: usize,

    /// Failed tasks.
    pub fail_count: usize,

    /// Success records in completion order.
    pub images: Vec<SyncRecord>,
}

impl SyncReport {
    /// Builds a report stamped with the current time.
    #[must_use]
    pub fn new(
        registry: impl Into<String>,
        owner: impl Into<String>,
        success_count: usize,
        fail_count: usize,
        images: Vec<SyncRecord>,
    ) -> Self {
        Self {
            updated_at: Utc::now().to_rfc3339(),
            registry: registry.into(),
            owner: owner.into(),
            total_count: success_count + fail_count,
            success_count,
            fail_count,
            images,
        }
    }

    /// Returns true when no task failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.fail_count == 0
    }

    /// Writes the report as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let io_err = |source| CoreError::ReportIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_err)?;

        info!(
            path = %path.display(),
            images = self.images.len(),
            "Report written"
        );
        Ok(())
    }
}
