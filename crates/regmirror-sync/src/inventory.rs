//! Inventory of images already present in the destination registry.

use std::sync::Arc;

use chrono::Utc;
use regmirror_core::{target_repository, Manifest, SharedSink, SyncEvent, SyncRecord, SyncReport};
use regmirror_registry::TagSource;
use tracing::{debug, info};

/// Builds a report from what the destination registry already holds.
pub struct Inventory {
    source: Arc<dyn TagSource>,
    registry: String,
    owner: String,
    sink: SharedSink,
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("source", &self.source.name())
            .field("registry", &self.registry)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Inventory {
    /// Creates an inventory over the destination's tag source.
    pub fn new(
        source: Arc<dyn TagSource>,
        registry: impl Into<String>,
        owner: impl Into<String>,
        sink: SharedSink,
    ) -> Self {
        Self {
            source,
            registry: registry.into(),
            owner: owner.into(),
            sink,
        }
    }

    /// Records every enabled entry whose pinned tag exists in the
    /// destination. Entries without it are skipped, never failed.
    pub async fn build(&self, manifest: &Manifest) -> SyncReport {
        let mut records = Vec::new();

        for entry in manifest.enabled() {
            let reference = entry.reference();
            let repository = target_repository(&reference.repository);
            let path = format!("{}/{repository}", self.owner);

            let tags = self.source.list_tags(&path).await;
            let Some(tag) = tags.into_iter().find(|t| t.name == reference.tag) else {
                self.sink.emit(&SyncEvent::EntrySkipped {
                    source: entry.source.clone(),
                    reason: format!("tag '{}' not found in {path}", reference.tag),
                });
                continue;
            };

            let digest = match tag.digest {
                Some(digest) => Some(digest),
                None => self.source.tag_digest(&path, &tag.name).await,
            };
            debug!(path = %path, tag = %tag.name, digest = ?digest, "Found mirrored tag");

            records.push(SyncRecord {
                name: reference.repository.clone(),
                source: entry.source.clone(),
                target: format!("{}/{path}:{}", self.registry, reference.tag),
                version: reference.tag.clone(),
                description: entry.description.clone(),
                repository,
                synced_at: tag
                    .created_at
                    .clone()
                    .unwrap_or_else(|| Utc::now().to_rfc3339()),
                digest,
                created_at: tag.created_at,
            });
        }

        info!(images = records.len(), "Inventory built");
        SyncReport::new(&self.registry, &self.owner, records.len(), 0, records)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use regmirror_core::{ImageEntry, MemorySink};
    use regmirror_registry::TagInfo;

    use super::*;

    #[derive(Debug)]
    struct Destination;

    #[async_trait]
    impl TagSource for Destination {
        async fn list_tags(&self, repository: &str) -> Vec<TagInfo> {
            match repository {
                "acme/library__nginx" => vec![
                    TagInfo::named("1.24.0"),
                    TagInfo {
                        name: "1.25.3".to_string(),
                        created_at: Some("2025-10-01T00:00:00Z".to_string()),
                        digest: None,
                    },
                ],
                "acme/library__redis" => vec![TagInfo::named("7.2.4")],
                _ => Vec::new(),
            }
        }

        async fn tag_digest(&self, repository: &str, tag: &str) -> Option<String> {
            (repository == "acme/library__nginx" && tag == "1.25.3")
                .then(|| "sha256:beef".to_string())
        }

        fn name(&self) -> &'static str {
            "destination"
        }
    }

    #[tokio::test]
    async fn test_build_lists_present_tags() {
        let manifest = Manifest {
            images: vec![
                ImageEntry::new("library/nginx:1.25.3").with_description("Web server"),
                ImageEntry::new("library/redis:7.4.1"),
                ImageEntry::new("library/absent:1.0"),
                ImageEntry::new("library/nginx:1.24.0").enabled(false),
            ],
            ..Manifest::default()
        };
        let sink = Arc::new(MemorySink::new());
        let inventory = Inventory::new(Arc::new(Destination), "ghcr.io", "acme", sink.clone());

        let report = inventory.build(&manifest).await;

        assert_eq!((report.success_count, report.fail_count, report.total_count), (1, 0, 1));
        let record = &report.images[0];
        assert_eq!(record.target, "ghcr.io/acme/library__nginx:1.25.3");
        assert_eq!(record.repository, "library__nginx");
        assert_eq!(record.digest.as_deref(), Some("sha256:beef"));
        assert_eq!(record.synced_at, "2025-10-01T00:00:00Z");
        assert_eq!(record.created_at.as_deref(), Some("2025-10-01T00:00:00Z"));
        assert_eq!(
            sink.filter(|e| matches!(e, SyncEvent::EntrySkipped { .. }))
                .len(),
            2
        );
    }
}
