//! OCI Distribution API tag source.
//!
//! Reads `GET /v2/<name>/tags/list` and resolves manifest digests with
//! `HEAD /v2/<name>/manifests/<reference>`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{RegistryAuth, TransportConfig};
use crate::error::{RegistryError, Result};
use crate::source::{TagInfo, TagSource};
use crate::transport::HttpTransport;

/// Manifest media types accepted when resolving digests.
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
    application/vnd.oci.image.manifest.v1+json, \
    application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.docker.distribution.manifest.v2+json";

/// Response from the `/v2/<name>/tags/list` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TagList {
    /// Repository name.
    pub name: String,

    /// List of tags; registries send `null` for an empty repository.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Tag source for any OCI distribution registry.
#[derive(Debug, Clone)]
pub struct OciTagSource {
    transport: HttpTransport,
    base_url: String,
}

impl OciTagSource {
    /// Creates a source for the registry at `registry`.
    ///
    /// A bare host such as `ghcr.io` is given an `https://` scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    ///
    /// # Examples
    ///
    /// ```
    /// use regmirror_registry::{OciTagSource, RegistryAuth, TransportConfig};
    ///
    /// let source = OciTagSource::new("ghcr.io", RegistryAuth::None, TransportConfig::new())?;
    /// assert_eq!(source.base_url(), "https://ghcr.io");
    /// # Ok::<(), regmirror_registry::RegistryError>(())
    /// ```
    pub fn new(registry: &str, auth: RegistryAuth, config: TransportConfig) -> Result<Self> {
        let base_url = if registry.contains("://") {
            registry.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", registry.trim_end_matches('/'))
        };
        url::Url::parse(&base_url).map_err(|_| RegistryError::InvalidUrl {
            url: base_url.clone(),
        })?;

        Ok(Self {
            transport: HttpTransport::new(config, auth)?,
            base_url,
        })
    }

    /// Returns the registry base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the tags of `name`; a missing repository yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    pub async fn fetch_tags(&self, name: &str) -> Result<Vec<String>> {
        let url = format!("{}/v2/{name}/tags/list", self.base_url);
        let response = self.transport.send(|http| http.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(name, "Repository not found");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(RegistryError::HttpError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let list: TagList = serde_json::from_slice(&response.bytes().await?)?;
        Ok(list.tags.unwrap_or_default())
    }

    /// Resolves the manifest digest of `name:reference`.
    ///
    /// Returns `None` when the manifest does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    pub async fn manifest_digest(&self, name: &str, reference: &str) -> Result<Option<String>> {
        let url = format!("{}/v2/{name}/manifests/{reference}", self.base_url);
        let response = self
            .transport
            .send(|http| http.head(&url).header(ACCEPT, MANIFEST_ACCEPT))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RegistryError::HttpError {
                status: response.status().as_u16(),
                message: format!("HEAD {url}"),
            });
        }

        Ok(response
            .headers()
            .get("docker-content-digest")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string))
    }
}

#[async_trait]
impl TagSource for OciTagSource {
    async fn list_tags(&self, repository: &str) -> Vec<TagInfo> {
        match self.fetch_tags(repository).await {
            Ok(tags) => tags.into_iter().map(TagInfo::named).collect(),
            Err(e) => {
                warn!(repository, error = %e, "Failed to list tags");
                Vec::new()
            }
        }
    }

    async fn tag_digest(&self, repository: &str, tag: &str) -> Option<String> {
        match self.manifest_digest(repository, tag).await {
            Ok(digest) => digest,
            Err(e) => {
                debug!(repository, tag, error = %e, "Digest lookup failed");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "oci"
    }
}
