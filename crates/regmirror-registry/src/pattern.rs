//! Tag pattern predicates.

use std::fmt::Debug;

use regex::Regex;

use crate::error::{RegistryError, Result};

/// A predicate over tag names.
pub trait TagPattern: Send + Sync + Debug {
    /// Returns true if `tag` satisfies the pattern.
    fn matches(&self, tag: &str) -> bool;
}

/// Where a [`RegexPattern`] is allowed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The match must begin at the first character of the tag.
    Prefix,

    /// The match may occur anywhere in the tag.
    Anywhere,
}

/// Regular-expression tag pattern.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    source: String,
    regex: Regex,
}

impl RegexPattern {
    /// Compiles `pattern` with the given match mode.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPattern`] if the regex does not compile.
    pub fn new(pattern: &str, mode: MatchMode) -> Result<Self> {
        let compiled = match mode {
            MatchMode::Prefix => Regex::new(&format!("^(?:{pattern})")),
            MatchMode::Anywhere => Regex::new(pattern),
        };
        let regex = compiled.map_err(|source| RegistryError::InvalidPattern {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Compiles an include pattern: the match must start at the tag's
    /// first character but need not cover the whole tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use regmirror_registry::{RegexPattern, TagPattern};
    ///
    /// let p = RegexPattern::prefix(r"\d+\.\d+").unwrap();
    /// assert!(p.matches("1.25-alpine"));
    /// assert!(!p.matches("v1.25"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the regex does not compile.
    pub fn prefix(pattern: &str) -> Result<Self> {
        Self::new(pattern, MatchMode::Prefix)
    }

    /// Compiles an exclude pattern that matches anywhere in the tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex does not compile.
    pub fn anywhere(pattern: &str) -> Result<Self> {
        Self::new(pattern, MatchMode::Anywhere)
    }

    /// Returns the pattern text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl TagPattern for RegexPattern {
    fn matches(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }
}
