//! Version ordering and winner selection for image tags.
//!
//! Tags are ordered by a [`VersionKey`]:
//! - `RELEASE.2025-10-15T17-29-55Z` → `(2025, 10, 15)`
//! - `v1.10.0`, `1.2-alpine` → numeric triple from the text before the first `-`
//! - anything else → fallback, below every versioned tag
//! - the literal `latest` → below everything
//!
//! Equal keys are ordered by the raw tag, so the order is total.

use std::collections::BTreeSet;

use regmirror_core::{ResolutionQuery, DEFAULT_TAG};

use crate::error::Result;
use crate::pattern::{RegexPattern, TagPattern};

/// Sort key of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionKey {
    /// The literal `latest` tag.
    Latest,

    /// A tag no version rule understands.
    Fallback,

    /// A release date or a `major.minor.patch` triple.
    Versioned(u64, u64, u64),
}

impl VersionKey {
    /// Computes the sort key of a tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use regmirror_registry::VersionKey;
    ///
    /// assert_eq!(VersionKey::of("v1.10.0"), VersionKey::Versioned(1, 10, 0));
    /// assert_eq!(VersionKey::of("1.2-alpine"), VersionKey::Versioned(1, 2, 0));
    /// assert_eq!(
    ///     VersionKey::of("RELEASE.2025-10-15T17-29-55Z"),
    ///     VersionKey::Versioned(2025, 10, 15)
    /// );
    /// assert_eq!(VersionKey::of("stable"), VersionKey::Fallback);
    /// assert_eq!(VersionKey::of("latest"), VersionKey::Latest);
    /// ```
    #[must_use]
    pub fn of(tag: &str) -> Self {
        if tag == DEFAULT_TAG {
            return Self::Latest;
        }
        if tag.starts_with("RELEASE.") {
            if let Some((y, m, d)) = find_date(tag) {
                return Self::Versioned(y, m, d);
            }
        }
        numeric_triple(tag).map_or(Self::Fallback, |(a, b, c)| Self::Versioned(a, b, c))
    }
}

/// Finds the first `DDDD-DD-DD` run in `text`.
fn find_date(text: &str) -> Option<(u64, u64, u64)> {
    const SHAPE: &[u8; 10] = b"dddd-dd-dd";

    text.as_bytes().windows(SHAPE.len()).find_map(|w| {
        let fits = w.iter().zip(SHAPE).all(|(c, s)| match s {
            b'd' => c.is_ascii_digit(),
            _ => c == s,
        });
        if !fits {
            return None;
        }
        let field = |r: std::ops::Range<usize>| {
            std::str::from_utf8(&w[r]).ok().and_then(|s| s.parse::<u64>().ok())
        };
        Some((field(0..4)?, field(5..7)?, field(8..10)?))
    })
}

/// Parses `[v]A[.B[.C]][-suffix]`; the first component must be numeric.
fn numeric_triple(tag: &str) -> Option<(u64, u64, u64)> {
    let body = tag.strip_prefix('v').unwrap_or(tag);
    let core = body.split('-').next().unwrap_or_default();

    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let mut rest = parts.map(|p| p.parse::<u64>().unwrap_or(0));
    let minor = rest.next().unwrap_or(0);
    let patch = rest.next().unwrap_or(0);
    Some((major, minor, patch))
}

/// Outcome of resolving one query: matching tags in ascending version order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    tags: Vec<String>,
}

impl Resolution {
    /// Returns the matching tags in ascending order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Consumes the resolution, returning the ordered tags.
    #[must_use]
    pub fn into_tags(self) -> Vec<String> {
        self.tags
    }

    /// Returns the winner: the greatest tag other than the literal `latest`.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|t| t.as_str() != DEFAULT_TAG)
            .map(String::as_str)
    }

    /// Returns true if no tag matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Returns the number of matching tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }
}

/// Filters and orders tag lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionResolver;

impl VersionResolver {
    /// Creates a new version resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Filters `tags` through the patterns and orders the survivors.
    ///
    /// # Examples
    ///
    /// ```
    /// use regmirror_registry::{RegexPattern, VersionResolver};
    ///
    /// let include = RegexPattern::prefix(".*").unwrap();
    /// let resolution = VersionResolver::new().resolve(
    ///     ["1.2.3", "v1.10.0", "1.2", "latest"],
    ///     &include,
    ///     None,
    /// );
    /// assert_eq!(resolution.latest(), Some("v1.10.0"));
    /// ```
    pub fn resolve<I, S>(
        &self,
        tags: I,
        include: &dyn TagPattern,
        exclude: Option<&dyn TagPattern>,
    ) -> Resolution
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let survivors: BTreeSet<String> = tags
            .into_iter()
            .filter(|t| include.matches(t.as_ref()))
            .filter(|t| !exclude.is_some_and(|x| x.matches(t.as_ref())))
            .map(|t| t.as_ref().to_string())
            .collect();

        let mut tags: Vec<String> = survivors.into_iter().collect();
        tags.sort_by_cached_key(|t| (VersionKey::of(t), t.clone()));
        Resolution { tags }
    }

    /// Compiles the query's patterns with [`RegexPattern`] and resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if either pattern is not a valid regex.
    pub fn resolve_query<I, S>(&self, tags: I, query: &ResolutionQuery) -> Result<Resolution>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let include = RegexPattern::prefix(&query.tag_pattern)?;
        let exclude = query
            .exclude_pattern
            .as_deref()
            .map(RegexPattern::anywhere)
            .transpose()?;

        Ok(self.resolve(
            tags,
            &include,
            exclude.as_ref().map(|p| p as &dyn TagPattern),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolve(tags: &[&str], include: &str, exclude: Option<&str>) -> Resolution {
        let query = ResolutionQuery::new("test/repo", include, exclude.map(str::to_string));
        VersionResolver::new().resolve_query(tags, &query).unwrap()
    }

    #[test]
    fn test_numeric_ordering_and_latest_never_wins() {
        let r = resolve(&["1.2.3", "v1.10.0", "1.2", "latest"], ".*", None);
        assert_eq!(r.latest(), Some("v1.10.0"));
        assert_eq!(r.tags(), ["latest", "1.2", "1.2.3", "v1.10.0"]);
    }

    #[test]
    fn test_release_dates() {
        let r = resolve(
            &[
                "RELEASE.2024-01-01T00-00-00Z",
                "RELEASE.2025-10-15T17-29-55Z",
                "RELEASE.2023-06-30T12-00-00Z",
            ],
            "RELEASE",
            None,
        );
        assert_eq!(r.latest(), Some("RELEASE.2025-10-15T17-29-55Z"));
    }

    #[test]
    fn test_include_and_exclude() {
        let r = resolve(&["v1.0", "v1.0-alpine", "1.0", "v2.0"], r"^v\d", Some("alpine"));
        assert_eq!(r.tags(), ["v1.0", "v2.0"]);
        assert_eq!(r.latest(), Some("v2.0"));
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let r = resolve(&["alpine", "edge"], r"\d+", None);
        assert!(r.is_empty());
        assert_eq!(r.latest(), None);

        let r = resolve(&[], ".*", None);
        assert_eq!(r.latest(), None);
    }

    #[test]
    fn test_only_latest_has_no_winner() {
        let r = resolve(&["latest"], ".*", None);
        assert_eq!(r.len(), 1);
        assert_eq!(r.latest(), None);
    }

    #[test]
    fn test_fallback_ranks_below_versioned() {
        let r = resolve(&["stable", "0.0.1", "edge"], ".*", None);
        assert_eq!(r.tags(), ["edge", "stable", "0.0.1"]);
        assert_eq!(r.latest(), Some("0.0.1"));
    }

    #[test]
    fn test_duplicates_removed() {
        let r = resolve(&["1.0", "1.0", "2.0"], ".*", None);
        assert_eq!(r.tags(), ["1.0", "2.0"]);
    }

    #[test]
    fn test_ties_broken_on_raw_tag() {
        // 1.2 and 1.2.0 share a key.
        let r = resolve(&["1.2.0", "1.2", "v1.2"], ".*", None);
        assert_eq!(r.tags(), ["1.2", "1.2.0", "v1.2"]);
    }

    #[test]
    fn test_key_details() {
        assert_eq!(VersionKey::of("1.2.3.4"), VersionKey::Versioned(1, 2, 3));
        assert_eq!(VersionKey::of("1.x"), VersionKey::Versioned(1, 0, 0));
        assert_eq!(VersionKey::of("RELEASE.bad"), VersionKey::Fallback);
        assert_eq!(VersionKey::of(""), VersionKey::Fallback);
        assert_eq!(VersionKey::of("vnext"), VersionKey::Fallback);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let query = ResolutionQuery::new("r", "[", None);
        assert!(VersionResolver::new().resolve_query(["1.0"], &query).is_err());
    }

    fn tag_strategy() -> impl Strategy<Value = String> {
        "(v?[0-9]{1,3}(\\.[0-9]{1,3}){0,3}(-[a-z]{1,6})?|RELEASE\\.20[0-9]{2}-[01][0-9]-[0-3][0-9]T00-00-00Z|latest|[a-z]{1,8})"
    }

    proptest! {
        /// Output is strictly increasing under (key, raw).
        #[test]
        fn resolution_is_strictly_ordered(tags in prop::collection::vec(tag_strategy(), 0..40)) {
            let include = RegexPattern::prefix(".*").unwrap();
            let r = VersionResolver::new().resolve(&tags, &include, None);
            for pair in r.tags().windows(2) {
                let a = (VersionKey::of(&pair[0]), &pair[0]);
                let b = (VersionKey::of(&pair[1]), &pair[1]);
                prop_assert!(a < b);
            }
        }

        /// The winner is never `latest` and no other tag outranks it.
        #[test]
        fn winner_is_maximal(tags in prop::collection::vec(tag_strategy(), 0..40)) {
            let include = RegexPattern::prefix(".*").unwrap();
            let r = VersionResolver::new().resolve(&tags, &include, None);
            match r.latest() {
                Some(winner) => {
                    prop_assert_ne!(winner, "latest");
                    let best = (VersionKey::of(winner), winner.to_string());
                    for t in tags.iter().filter(|t| t.as_str() != "latest") {
                        prop_assert!((VersionKey::of(t), t.clone()) <= best);
                    }
                }
                None => prop_assert!(tags.iter().all(|t| t == "latest")),
            }
        }
    }
}
