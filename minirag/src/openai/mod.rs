//! OpenAI-compatible embedding and chat completion clients.
//!
//! Both clients call the REST API directly through `reqwest`, with a
//! per-request timeout from [`OpenAIConfig`]. A timeout is reported the same
//! way as any other transport failure.

mod chat;
mod embedding;

use std::time::Duration;

use serde::Deserialize;

pub use chat::OpenAIChatModel;
pub use embedding::OpenAIEmbeddingProvider;

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider name used in errors and logs.
pub(crate) const PROVIDER: &str = "OpenAI";

/// Connection settings shared by the OpenAI clients.
#[derive(Clone)]
pub struct OpenAIConfig {
    /// Secret API key. Never logged.
    pub api_key: String,
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to each request.
    pub timeout: Duration,
}

impl OpenAIConfig {
    /// Create a configuration for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read `OPENAI_API_KEY` and the optional `OPENAI_BASE_URL`.
    ///
    /// A missing key yields an empty one; the clients reject it when they
    /// are constructed, with the error kind of the service they talk to.
    pub fn from_env() -> Self {
        let mut config = Self::new(std::env::var("OPENAI_API_KEY").unwrap_or_default());
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        config
    }

    /// Point the clients at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Build an HTTP client, reporting failures as a plain message.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, String> {
        if self.api_key.trim().is_empty() {
            return Err("API key must not be empty (set OPENAI_API_KEY)".to_string());
        }
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))
    }
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ── OpenAI API error body ──────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Describe a failed `send()`, calling out timeouts explicitly.
pub(crate) fn describe_send_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs_f32())
    } else {
        format!("request failed: {err}")
    }
}

/// Turn a non-success response into a message, preferring the API's own
/// error text over the raw body.
pub(crate) async fn describe_error_response(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_key() {
        let config = OpenAIConfig::new("sk-secret-value");
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret-value"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = OpenAIConfig::new("k").with_base_url("http://localhost:9999/v1/");
        assert_eq!(config.endpoint("embeddings"), "http://localhost:9999/v1/embeddings");
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(OpenAIConfig::new("  ").http_client().is_err());
    }
}
