//! The external registry tool: image copy and digest lookup.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Copies images between registries and resolves manifest digests.
#[async_trait]
pub trait RegistryTool: Send + Sync {
    /// Copies `source` to `target`.
    async fn copy(&self, source: &str, target: &str) -> Result<()>;

    /// Returns the manifest digest of `reference`, or `None` when it cannot
    /// be determined.
    async fn digest(&self, reference: &str) -> Option<String>;

    /// Returns the tool name for identification.
    fn name(&self) -> &'static str;
}

/// `regctl` command-line client.
#[derive(Debug, Clone)]
pub struct Regctl {
    program: PathBuf,
    digest_timeout: Duration,
}

impl Default for Regctl {
    fn default() -> Self {
        Self::new("regctl")
    }
}

impl Regctl {
    /// Creates a client running `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            digest_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the digest lookup timeout.
    pub const fn with_digest_timeout(mut self, timeout: Duration) -> Self {
        self.digest_timeout = timeout;
        self
    }

    /// Arguments of the copy invocation.
    pub fn copy_args<'a>(source: &'a str, target: &'a str) -> [&'a str; 9] {
        [
            "image",
            "copy",
            "--verbosity",
            "info",
            "--digest-tags",
            "--include-external",
            "--referrers",
            source,
            target,
        ]
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RegistryTool for Regctl {
    async fn copy(&self, source: &str, target: &str) -> Result<()> {
        let args = Self::copy_args(source, target);
        debug!(program = %self.program.display(), args = ?args, "Running copy");

        let output = self
            .command()
            .args(args)
            .output()
            .await
            .map_err(|e| SyncError::ToolSpawn {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(SyncError::CopyFailed {
            source_ref: source.to_string(),
            target: target.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn digest(&self, reference: &str) -> Option<String> {
        let run = self.command().args(["image", "digest", reference]).output();
        let output = match tokio::time::timeout(self.digest_timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(reference, error = %e, "Digest lookup could not start");
                return None;
            }
            Err(_) => {
                debug!(reference, "Digest lookup timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                reference,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Digest lookup failed"
            );
            return None;
        }

        let digest = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!digest.is_empty()).then_some(digest)
    }

    fn name(&self) -> &'static str {
        "regctl"
    }
}
