//! Image entries, references and mirror tasks.
//!
//! An [`ImageEntry`] is one record of the manifest. Its `source` field is an
//! image reference of the form `repository[:tag]`; the tag defaults to
//! [`DEFAULT_TAG`] when omitted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag assumed when a source reference carries none.
pub const DEFAULT_TAG: &str = "latest";

/// A parsed `repository[:tag]` image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageReference {
    /// Repository path, including any registry host.
    pub repository: String,

    /// Tag name.
    pub tag: String,
}

impl ImageReference {
    /// Parses a source reference.
    ///
    /// The tag is the text after the last `:` only when that colon comes
    /// after the last `/`, so a registry port is never mistaken for a tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use regmirror_core::ImageReference;
    ///
    /// let r = ImageReference::parse("bitnami/redis:7.2");
    /// assert_eq!(r.repository, "bitnami/redis");
    /// assert_eq!(r.tag, "7.2");
    ///
    /// let r = ImageReference::parse("registry.local:5000/tools/app");
    /// assert_eq!(r.repository, "registry.local:5000/tools/app");
    /// assert_eq!(r.tag, "latest");
    /// ```
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        let slash = source.rfind('/');

        match source.rfind(':') {
            Some(colon) if slash.is_none_or(|s| colon > s) && colon + 1 < source.len() => Self {
                repository: source[..colon].to_string(),
                tag: source[colon + 1..].to_string(),
            },
            Some(colon) if slash.is_none_or(|s| colon > s) => Self {
                repository: source[..colon].to_string(),
                tag: DEFAULT_TAG.to_string(),
            },
            _ => Self {
                repository: source.to_string(),
                tag: DEFAULT_TAG.to_string(),
            },
        }
    }

    /// Returns a copy of this reference pointing at another tag.
    #[must_use]
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            repository: self.repository.clone(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Maps an image name to its repository name under the destination owner.
///
/// Every `/` becomes `__`. Distinct names that collide after the mapping are
/// not detected.
///
/// # Examples
///
/// ```
/// use regmirror_core::target_repository;
///
/// assert_eq!(target_repository("library/nginx"), "library__nginx");
/// assert_eq!(target_repository("redis"), "redis");
/// ```
#[must_use]
pub fn target_repository(image_name: &str) -> String {
    image_name.replace('/', "__")
}

/// One manifest record describing an image to track and mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Source reference (`repository[:tag]`).
    pub source: String,

    /// Whether the entry takes part in resolution and mirroring.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Regex a tag must match (anchored at the start) to be considered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_pattern: Option<String>,

    /// Regex whose matching tags are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_pattern: Option<String>,

    /// Mirror every tag passing the filters instead of only the pinned one.
    #[serde(default)]
    pub sync_all_matching: bool,

    /// Keys this tool does not interpret, kept so saving is lossless.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

const fn default_enabled() -> bool {
    true
}

impl ImageEntry {
    /// Creates an enabled entry for the given source reference.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            enabled: true,
            description: String::new(),
            tag_pattern: None,
            exclude_pattern: None,
            sync_all_matching: false,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the required tag pattern.
    #[must_use]
    pub fn with_tag_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tag_pattern = Some(pattern.into());
        self
    }

    /// Sets the exclusion pattern.
    #[must_use]
    pub fn with_exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_pattern = Some(pattern.into());
        self
    }

    /// Enables or disables the entry.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Mirrors every matching tag instead of only the pinned one.
    #[must_use]
    pub const fn sync_all(mut self, sync_all: bool) -> Self {
        self.sync_all_matching = sync_all;
        self
    }

    /// Parses the source reference.
    #[must_use]
    pub fn reference(&self) -> ImageReference {
        ImageReference::parse(&self.source)
    }

    /// Returns the image name (repository without tag).
    #[must_use]
    pub fn image_name(&self) -> String {
        self.reference().repository
    }

    /// Returns the pinned tag.
    #[must_use]
    pub fn pinned_tag(&self) -> String {
        self.reference().tag
    }

    /// Rewrites the source to point at `tag`, keeping the repository.
    pub fn set_tag(&mut self, tag: &str) {
        self.source = self.reference().with_tag(tag).to_string();
    }

    /// Builds the resolution query for this entry.
    ///
    /// Returns `None` when the entry declares no tag pattern.
    #[must_use]
    pub fn resolution_query(&self) -> Option<ResolutionQuery> {
        self.tag_pattern.as_ref().map(|pattern| ResolutionQuery {
            repository: self.image_name(),
            tag_pattern: pattern.clone(),
            exclude_pattern: self.exclude_pattern.clone(),
        })
    }
}

/// The inputs of one version resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolutionQuery {
    /// Repository to list tags for.
    pub repository: String,

    /// Pattern a tag must match.
    pub tag_pattern: String,

    /// Pattern whose matches are dropped.
    pub exclude_pattern: Option<String>,
}

impl ResolutionQuery {
    /// Creates a query.
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        tag_pattern: impl Into<String>,
        exclude_pattern: Option<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            tag_pattern: tag_pattern.into(),
            exclude_pattern,
        }
    }
}

impl fmt::Display for ResolutionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pattern `{}`", self.repository, self.tag_pattern)?;
        if let Some(ref exclude) = self.exclude_pattern {
            write!(f, ", exclude `{exclude}`")?;
        }
        write!(f, ")")
    }
}

/// A unit of mirror work: one image at one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncTask {
    /// Image name (repository without tag).
    pub image_name: String,

    /// Tag to mirror.
    pub version: String,

    /// Description copied from the manifest entry.
    pub description: String,
}

impl SyncTask {
    /// Creates a task.
    #[must_use]
    pub fn new(
        image_name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            version: version.into(),
            description: description.into(),
        }
    }

    /// Returns the source reference `image_name:version`.
    #[must_use]
    pub fn source(&self) -> String {
        format!("{}:{}", self.image_name, self.version)
    }
}
