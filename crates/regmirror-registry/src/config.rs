//! Configuration types for tag sources.

use std::time::Duration;

/// Default Docker Hub API base URL.
pub const DOCKER_HUB_API: &str = "https://registry.hub.docker.com/v2";

/// HTTP transport settings shared by every tag source.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,

    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,

    /// Retries after the first attempt for 5xx responses and timeouts.
    pub max_retries: u32,

    /// Base backoff; retry `n` (1-based) waits `backoff * 2^(n-1)`.
    pub backoff: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
            max_retries: 3,
            backoff: Duration::from_secs(1),
            user_agent: format!("regmirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Creates a transport configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the idle pool size per host.
    #[must_use]
    pub const fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_max_idle_per_host = size;
        self
    }

    /// Sets the retry budget and base backoff.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Returns the wait before retry `n` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use regmirror_registry::TransportConfig;
    ///
    /// let config = TransportConfig::default();
    /// assert_eq!(config.backoff_for(1), Duration::from_secs(1));
    /// assert_eq!(config.backoff_for(3), Duration::from_secs(4));
    /// ```
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1_u32 << exponent)
    }
}

/// Authentication methods for registry access.
#[derive(Debug, Clone, Default)]
pub enum RegistryAuth {
    /// Anonymous access.
    #[default]
    None,

    /// Basic authentication (username/password or username/token).
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },

    /// Bearer token authentication.
    Bearer {
        /// Token value.
        token: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use regmirror_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("user", "pass");
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer token authentication.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Bearer auth from an optional token, anonymous when absent or empty.
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some(t) if !t.trim().is_empty() => Self::bearer(t.trim()),
            _ => Self::None,
        }
    }
}
