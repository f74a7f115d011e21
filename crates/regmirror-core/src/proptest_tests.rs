//! Property-based tests for regmirror-core types.

use proptest::prelude::*;

use crate::{target_repository, ImageEntry, ImageReference, DEFAULT_TAG};

/// Strategy for generating repository paths, optionally with a registry port.
fn repository_strategy() -> impl Strategy<Value = String> {
    (
        prop::option::of("[a-z]{3,10}\\.(io|com|local)(:[0-9]{2,5})?"),
        prop::collection::vec("[a-z][a-z0-9-]{0,12}", 1..4),
    )
        .prop_map(|(host, segments)| match host {
            Some(host) => format!("{host}/{}", segments.join("/")),
            None => segments.join("/"),
        })
}

/// Strategy for generating tags.
fn tag_strategy() -> impl Strategy<Value = String> {
    "(v?[0-9]{1,3}(\\.[0-9]{1,3}){0,2}(-[a-z]{3,8})?|RELEASE\\.20[0-9]{2}-[01][0-9]-[0-3][0-9]T[0-9]{2}-[0-9]{2}-[0-9]{2}Z|latest)"
}

proptest! {
    /// A tagged reference splits back into its parts.
    #[test]
    fn parse_tagged_reference(repo in repository_strategy(), tag in tag_strategy()) {
        let parsed = ImageReference::parse(&format!("{repo}:{tag}"));
        prop_assert_eq!(&parsed.repository, &repo);
        prop_assert_eq!(&parsed.tag, &tag);
    }

    /// A reference without a tag never treats a registry port as one.
    #[test]
    fn parse_untagged_reference(repo in repository_strategy()) {
        let parsed = ImageReference::parse(&repo);
        prop_assert_eq!(&parsed.repository, &repo);
        prop_assert_eq!(parsed.tag.as_str(), DEFAULT_TAG);
    }

    /// Target repository names never contain a path separator.
    #[test]
    fn target_repository_is_flat(repo in repository_strategy()) {
        let target = target_repository(&repo);
        prop_assert!(!target.contains('/'));
        prop_assert_eq!(target.matches("__").count(), repo.matches('/').count());
    }

    /// Retagging an entry keeps its repository.
    #[test]
    fn set_tag_keeps_repository(
        repo in repository_strategy(),
        old in prop::option::of(tag_strategy()),
        new in tag_strategy(),
    ) {
        let source = old.map_or_else(|| repo.clone(), |t| format!("{repo}:{t}"));
        let mut entry = ImageEntry::new(source);
        entry.set_tag(&new);
        prop_assert_eq!(entry.image_name(), repo);
        prop_assert_eq!(entry.pinned_tag(), new);
    }
}
