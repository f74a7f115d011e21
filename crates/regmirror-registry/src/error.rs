//! Error types for registry operations.

use thiserror::Error;

/// Result type alias using [`RegistryError`].
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// Authentication header could not be built.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// HTTP error from registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid registry URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// A tag pattern is not a valid regular expression.
    #[error("Invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Pattern text.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: Box<regex::Error>,
    },
}

impl RegistryError {
    /// Returns true if the request may succeed when repeated.
    ///
    /// Server errors (5xx) and timeouts are retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed { .. } => true,
            Self::HttpError { status, .. } => *status >= 500 && *status < 600,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::ConnectionFailed { url, source: err }
        } else if err.is_status() {
            let status = err.status().map_or(0, |s| s.as_u16());
            Self::HttpError {
                status,
                message: err.to_string(),
            }
        } else {
            Self::HttpError {
                status: 0,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_http() {
        let err = RegistryError::HttpError {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error from registry: 503 - unavailable"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RegistryError::HttpError {
            status: 502,
            message: String::new()
        }
        .is_retryable());
        assert!(RegistryError::Timeout {
            url: "https://hub".to_string()
        }
        .is_retryable());
        assert!(!RegistryError::HttpError {
            status: 404,
            message: String::new()
        }
        .is_retryable());
        assert!(!RegistryError::AuthenticationFailed {
            message: "bad".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = RegistryError::InvalidPattern {
            pattern: "(".to_string(),
            source: Box::new(source),
        };
        assert!(err.to_string().starts_with("Invalid tag pattern '('"));
    }
}
