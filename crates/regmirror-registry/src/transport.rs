//! Shared HTTP transport with connection pooling and retry.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

use crate::config::{RegistryAuth, TransportConfig};
use crate::error::{RegistryError, Result};

/// A pooled HTTP client that retries 5xx responses and timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: TransportConfig,
    auth: RegistryAuth,
}

impl HttpTransport {
    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: TransportConfig, auth: RegistryAuth) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RegistryError::ConnectionFailed {
                url: "client".to_string(),
                source: e,
            })?;

        Ok(Self { http, config, auth })
    }

    /// Returns the underlying client for building requests.
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends the request produced by `build`, retrying transient failures.
    ///
    /// Non-5xx responses are returned as-is so callers can inspect the status.
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry budget is spent, or the first
    /// non-retryable error.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let headers = self.auth_headers()?;
        let mut retry = 0;

        loop {
            let outcome = build(&self.http).headers(headers.clone()).send().await;

            let error = match outcome {
                Ok(response) if response.status().is_server_error() => RegistryError::HttpError {
                    status: response.status().as_u16(),
                    message: response.text().await.unwrap_or_default(),
                },
                Ok(response) => return Ok(response),
                Err(e) => RegistryError::from(e),
            };

            if !error.is_retryable() || retry >= self.config.max_retries {
                return Err(error);
            }

            retry += 1;
            let delay = self.config.backoff_for(retry);
            warn!(
                error = %error,
                retry,
                max_retries = self.config.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Registry request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Creates authentication headers based on configuration.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        match &self.auth {
            RegistryAuth::None => {}
            RegistryAuth::Basic { username, password } => {
                let credentials = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{username}:{password}"),
                );
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|_| {
                        RegistryError::AuthenticationFailed {
                            message: "Invalid credentials".to_string(),
                        }
                    })?,
                );
            }
            RegistryAuth::Bearer { token } => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                        RegistryError::AuthenticationFailed {
                            message: "Invalid token".to_string(),
                        }
                    })?,
                );
            }
        }

        debug!(authenticated = !headers.is_empty(), "Built request headers");
        Ok(headers)
    }
}
