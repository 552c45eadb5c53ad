use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ConfigError, RegistrationError};

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    token: String,
}

/// Opaque credential for joining exactly one room.
///
/// Never empty. `Debug` does not print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Returns `None` for an empty token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() { None } else { Some(Self(token)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Exchanges a display name for an access token.
pub trait Registrar: Send + Sync + 'static {
    fn register(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<AccessToken, RegistrationError>> + Send;
}

/// HTTP client for the token service's `POST /register` endpoint.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl RegistrationClient {
    /// `base_url` is the service root, e.g. `https://tokens.example.com`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&format!("{}/register", base_url.trim_end_matches('/')))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn map_http_error(&self, e: reqwest::Error) -> RegistrationError {
        if e.is_timeout() {
            RegistrationError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RegistrationError::Network(e.to_string())
        }
    }
}

impl Registrar for RegistrationClient {
    async fn register(&self, username: &str) -> Result<AccessToken, RegistrationError> {
        tracing::info!("registering {username} at {}", self.endpoint);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&RegisterRequest { username })
            .send()
            .await
            .map_err(|e| self.map_http_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("registration rejected with status {status}");
            return Err(RegistrationError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| self.map_http_error(e))?;
        let data: RegisterResponse = serde_json::from_str(&body)
            .map_err(|e| RegistrationError::Malformed(e.to_string()))?;

        AccessToken::new(data.token).ok_or(RegistrationError::EmptyToken)
    }
}
