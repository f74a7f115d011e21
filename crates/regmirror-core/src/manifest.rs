//! The YAML image manifest and its on-disk store.
//!
//! ```yaml
//! images:
//!   - source: library/nginx:1.25.3
//!     description: Web server
//!     tag_pattern: '^\d+\.\d+\.\d+$'
//!     exclude_pattern: '.*-rc.*'
//! config:
//!   last_checked: '2025-10-20T08:00:00+00:00'
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::image::ImageEntry;

/// Top-level manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Tracked images, in file order.
    #[serde(default)]
    pub images: Vec<ImageEntry>,

    /// Manifest bookkeeping.
    #[serde(default)]
    pub config: ManifestConfig,

    /// Top-level keys this tool does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The `config` section of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// RFC 3339 timestamp of the last resolution run that changed the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,

    /// Keys this tool does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Manifest {
    /// Parses a manifest from YAML text. Empty text yields an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns the YAML error when the text is not a valid manifest.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Renders the manifest as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Returns the enabled entries.
    pub fn enabled(&self) -> impl Iterator<Item = &ImageEntry> {
        self.images.iter().filter(|e| e.enabled)
    }

    /// Stamps `config.last_checked` with the current UTC time.
    pub fn touch(&mut self) {
        self.config.last_checked = Some(Utc::now().to_rfc3339());
    }
}

/// Owns a manifest and the path it was loaded from.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    manifest: Manifest,
}

impl ManifestStore {
    /// Loads the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ManifestNotFound`] when the file is missing and a
    /// parse or I/O error when it cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(CoreError::ManifestNotFound { path });
        }

        let text = std::fs::read_to_string(&path).map_err(|source| CoreError::ManifestIo {
            path: path.clone(),
            source,
        })?;
        let manifest = Manifest::from_yaml(&text).map_err(|source| CoreError::ManifestParse {
            path: path.clone(),
            source,
        })?;

        info!(
            path = %path.display(),
            images = manifest.images.len(),
            "Loaded manifest"
        );
        Ok(Self { path, manifest })
    }

    /// Loads the manifest at `path`, falling back to an empty manifest when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn open_or_default(path: impl Into<PathBuf>) -> Result<Self> {
        match Self::open(path) {
            Err(CoreError::ManifestNotFound { path }) => {
                warn!(path = %path.display(), "Manifest not found, starting empty");
                Ok(Self::new(path, Manifest::default()))
            }
            other => other,
        }
    }

    /// Wraps an in-memory manifest that will be saved to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            path: path.into(),
            manifest,
        }
    }

    /// Returns the manifest path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the manifest.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Returns the manifest for mutation.
    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Consumes the store, returning the manifest.
    #[must_use]
    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    /// Writes the manifest back to its path.
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the target, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or any file operation fails.
    pub fn save(&self) -> Result<()> {
        let yaml = self.manifest.to_yaml()?;
        let io_err = |source| CoreError::ManifestIo {
            path: self.path.clone(),
            source,
        };

        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "manifest".into(), |n| n.to_string_lossy().into_owned());
        let tmp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

        let mut file = std::fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(yaml.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), bytes = yaml.len(), "Manifest written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
# tracked images
images:
  - source: library/nginx:1.24.0
    description: Web server
    tag_pattern: '^\d+\.\d+\.\d+$'
    exclude_pattern: '.*-rc.*'
  - source: redis:7.2
    enabled: false
    maintainer: cache-team
config:
  last_checked: '2025-01-01T00:00:00+00:00'
  notify: ops
"#;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_open_parses_entries() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "images-manifest.yml", SAMPLE);

        let store = ManifestStore::open(&path).unwrap();
        let manifest = store.manifest();
        assert_eq!(manifest.images.len(), 2);
        assert_eq!(manifest.enabled().count(), 1);
        assert_eq!(
            manifest.config.last_checked.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ManifestStore::open(dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, CoreError::ManifestNotFound { .. }));
    }

    #[test]
    fn test_open_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open_or_default(dir.path().join("nope.yml")).unwrap();
        assert!(store.manifest().images.is_empty());
    }

    #[test]
    fn test_open_malformed_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.yml", "images: [unclosed\n");
        let err = ManifestStore::open(&path).unwrap_err();
        assert!(matches!(err, CoreError::ManifestParse { .. }));
    }

    #[test]
    fn test_empty_file_is_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.yml", "");
        let store = ManifestStore::open(&path).unwrap();
        assert_eq!(store.manifest(), &Manifest::default());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "images-manifest.yml", SAMPLE);

        let mut store = ManifestStore::open(&path).unwrap();
        store.manifest_mut().images[0].set_tag("1.25.3");
        store.manifest_mut().touch();
        store.save().unwrap();

        let reloaded = ManifestStore::open(&path).unwrap();
        let manifest = reloaded.manifest();
        assert_eq!(manifest.images[0].source, "library/nginx:1.25.3");
        assert_eq!(
            manifest.images[1].extra.get("maintainer"),
            Some(&serde_yaml::Value::String("cache-team".to_string()))
        );
        assert!(manifest.config.extra.contains_key("notify"));
        assert_ne!(
            manifest.config.last_checked.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
