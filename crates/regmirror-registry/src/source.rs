//! Tag sources: paginated tag listings of a source registry.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{RegistryAuth, TransportConfig, DOCKER_HUB_API};
use crate::error::{RegistryError, Result};
use crate::transport::HttpTransport;

/// One tag reported by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    /// Tag name.
    pub name: String,

    /// Creation or last-update time, as reported.
    pub created_at: Option<String>,

    /// Manifest digest, as reported.
    pub digest: Option<String>,
}

impl TagInfo {
    /// Creates a tag with no metadata.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: None,
            digest: None,
        }
    }
}

/// Lists the tags of a repository.
///
/// Implementations fail soft: a request error yields an empty list and a
/// warning, never an error.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Returns the tags of `repository`.
    async fn list_tags(&self, repository: &str) -> Vec<TagInfo>;

    /// Returns the manifest digest of `repository:tag`, if the source can
    /// resolve one.
    async fn tag_digest(&self, _repository: &str, _tag: &str) -> Option<String> {
        None
    }

    /// Returns the source name for identification.
    fn name(&self) -> &'static str;
}

/// Docker Hub tag listing page.
#[derive(Debug, Deserialize)]
struct HubPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<HubTag>,
}

#[derive(Debug, Deserialize)]
struct HubTag {
    name: String,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    digest: Option<String>,
}

/// Tag source backed by the Docker Hub repositories API.
#[derive(Debug, Clone)]
pub struct DockerHubTagSource {
    transport: HttpTransport,
    base_url: String,
    max_pages: u32,
    page_size: u32,
}

impl DockerHubTagSource {
    /// Default number of pages fetched per repository.
    pub const DEFAULT_MAX_PAGES: u32 = 5;

    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    /// Creates a source against the public Docker Hub API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: TransportConfig) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(config, RegistryAuth::None)?,
            base_url: DOCKER_HUB_API.to_string(),
            max_pages: Self::DEFAULT_MAX_PAGES,
            page_size: Self::DEFAULT_PAGE_SIZE,
        })
    }

    /// Points the source at another API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidUrl`] if `base_url` is not a URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|_| RegistryError::InvalidUrl {
            url: base_url.clone(),
        })?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Sets the page limit.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Fetches all pages for `repository`, up to the page limit.
    ///
    /// # Errors
    ///
    /// Returns the first request or decode error.
    pub async fn fetch_tags(&self, repository: &str) -> Result<Vec<TagInfo>> {
        let url = format!("{}/repositories/{repository}/tags", self.base_url);
        let mut tags = Vec::new();

        for page in 1..=self.max_pages {
            debug!(repository, page, "Fetching tag page");

            let response = self
                .transport
                .send(|http| {
                    http.get(&url).query(&[
                        ("page_size", self.page_size.to_string()),
                        ("page", page.to_string()),
                        ("ordering", "last_updated".to_string()),
                    ])
                })
                .await?;

            if !response.status().is_success() {
                return Err(RegistryError::HttpError {
                    status: response.status().as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let body: HubPage = serde_json::from_slice(&response.bytes().await?)?;
            if body.results.is_empty() {
                break;
            }

            tags.extend(body.results.into_iter().map(|t| TagInfo {
                name: t.name,
                created_at: t.last_updated,
                digest: t.digest,
            }));

            if body.next.is_none() {
                break;
            }
        }

        debug!(repository, count = tags.len(), "Fetched tags");
        Ok(tags)
    }
}

#[async_trait]
impl TagSource for DockerHubTagSource {
    async fn list_tags(&self, repository: &str) -> Vec<TagInfo> {
        match self.fetch_tags(repository).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(repository, error = %e, "Failed to list tags");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "docker-hub"
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal canned-response HTTP server for transport tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `responses` in order (the last one repeats) and counts requests.
    pub async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[n.min(responses.len() - 1)].clone();

                let mut buf = vec![0_u8; 8192];
                let _ = stream.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ndocker-content-digest: sha256:feed\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::test_server::serve;
    use super::*;

    fn fast() -> TransportConfig {
        TransportConfig::new().with_retries(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_pages_until_next_is_null() {
        let (base, hits) = serve(vec![
            (
                200,
                r#"{"next":"more","results":[{"name":"1.0","last_updated":"2025-01-01T00:00:00Z"}]}"#
                    .to_string(),
            ),
            (200, r#"{"next":null,"results":[{"name":"2.0"}]}"#.to_string()),
        ])
        .await;

        let source = DockerHubTagSource::new(fast())
            .unwrap()
            .with_base_url(base)
            .unwrap();
        let tags = source.list_tags("library/nginx").await;

        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["1.0", "2.0"]);
        assert_eq!(tags[0].created_at.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stops_at_page_limit() {
        let (base, hits) = serve(vec![(
            200,
            r#"{"next":"more","results":[{"name":"1.0"}]}"#.to_string(),
        )])
        .await;

        let source = DockerHubTagSource::new(fast())
            .unwrap()
            .with_base_url(base)
            .unwrap()
            .with_max_pages(3);
        let tags = source.list_tags("redis").await;

        assert_eq!(tags.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_errors_retried_then_fail_soft() {
        let (base, hits) = serve(vec![(503, "{}".to_string())]).await;

        let source = DockerHubTagSource::new(fast())
            .unwrap()
            .with_base_url(base)
            .unwrap();
        let tags = source.list_tags("redis").await;

        assert!(tags.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let (base, hits) = serve(vec![(404, r#"{"message":"not found"}"#.to_string())]).await;

        let source = DockerHubTagSource::new(fast())
            .unwrap()
            .with_base_url(base)
            .unwrap();
        assert!(source.list_tags("missing/repo").await.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = DockerHubTagSource::new(TransportConfig::new())
            .unwrap()
            .with_base_url("not a url")
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidUrl { .. }));
    }
}
