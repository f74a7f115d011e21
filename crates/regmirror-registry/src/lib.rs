//! # Regmirror Registry
//!
//! Tag discovery and version resolution for regmirror.
//!
//! ## Features
//!
//! - **Tag sources**: Docker Hub repositories API and OCI distribution `tags/list`
//! - **Pooled transport**: shared `reqwest` client retrying 5xx responses and timeouts
//! - **Tag patterns**: injected predicates with a regex default
//! - **Version resolution**: release-date and numeric ordering with a `latest` guard
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use regmirror_core::ResolutionQuery;
//! use regmirror_registry::{DockerHubTagSource, TagSource, TransportConfig, VersionResolver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = DockerHubTagSource::new(TransportConfig::default())?;
//!     let tags = source.list_tags("library/nginx").await;
//!
//!     let query = ResolutionQuery::new("library/nginx", r"\d+\.\d+\.\d+$", None);
//!     let resolution = VersionResolver::new()
//!         .resolve_query(tags.iter().map(|t| t.name.as_str()), &query)?;
//!     println!("latest: {:?}", resolution.latest());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod oci;
mod pattern;
mod source;
mod transport;
mod version;

pub use config::{RegistryAuth, TransportConfig, DOCKER_HUB_API};
pub use error::{RegistryError, Result};
pub use oci::{OciTagSource, TagList, MANIFEST_ACCEPT};
pub use pattern::{MatchMode, RegexPattern, TagPattern};
pub use source::{DockerHubTagSource, TagInfo, TagSource};
pub use transport::HttpTransport;
pub use version::{Resolution, VersionKey, VersionResolver};
