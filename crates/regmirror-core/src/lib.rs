//! # Regmirror Core
//!
//! Core types for the regmirror registry-mirroring tool.
//!
//! This crate provides the foundational data structures shared by the
//! resolution and mirroring pipeline:
//!
//! - [`ImageEntry`] - One manifest record describing an image to track
//! - [`ImageReference`] - A parsed `repository[:tag]` source reference
//! - [`ManifestStore`] - Loads, holds and saves the YAML manifest
//! - [`SyncTask`] / [`SyncRecord`] / [`SyncReport`] - Units of mirror work and their outcome
//! - [`EventSink`] - Structured event sink consumed by presentation layers
//!
//! ## Example
//!
//! ```rust
//! use regmirror_core::{ImageEntry, ImageReference};
//!
//! let entry = ImageEntry::new("library/nginx:1.25.3").with_tag_pattern(r"^\d+\.\d+\.\d+$");
//! let reference = entry.reference();
//! assert_eq!(reference.repository, "library/nginx");
//! assert_eq!(reference.tag, "1.25.3");
//!
//! let bare = ImageReference::parse("localhost:5000/app");
//! assert_eq!(bare.tag, "latest");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod image;
pub mod manifest;
pub mod report;
pub mod sink;

#[cfg(test)]
mod proptest_tests;

// Re-export main types at crate root
pub use error::{CoreError, Result};
pub use event::{EventSeverity, SkipReason, SyncEvent};
pub use image::{target_repository, ImageEntry, ImageReference, ResolutionQuery, SyncTask, DEFAULT_TAG};
pub use manifest::{Manifest, ManifestConfig, ManifestStore};
pub use report::{SyncRecord, SyncReport};
pub use sink::{EventSink, MemorySink, NoopSink, SharedSink, TracingSink};
