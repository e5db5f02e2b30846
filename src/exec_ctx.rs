//! Execution context shared across generation calls.
//!
//! [`ExecCtx`] carries the HTTP client, backend, base URL, retry policy,
//! attempt timeout, durable error store, and optional event handler. It is
//! constructed once and shared by every operation.

use crate::backend::{Backend, HttpBackend};
use crate::error::Result;
use crate::events::EventHandler;
use crate::platform::Endpoint;
use crate::retry::RetryPolicy;
use crate::store::{ErrorStore, MemoryErrorStore};
use crate::timeout::DEFAULT_TIMEOUT;
use crate::PipelineError;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Shared execution context for generation calls.
///
/// # Example
///
/// ```
/// use content_gen_pipeline::ExecCtx;
/// use std::time::Duration;
///
/// let ctx = ExecCtx::builder("http://3.129.88.226:5000")
///     .timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(ctx.url("/linkedin"), "http://3.129.88.226:5000/linkedin");
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Base URL of the generation service, without trailing slash.
    pub base_url: String,
    /// Transport. Default: [`HttpBackend`].
    pub backend: Arc<dyn Backend>,
    /// Retry policy. Default: [`RetryPolicy::default()`].
    pub retry: RetryPolicy,
    /// Budget for one attempt. Default: 30 seconds.
    pub timeout: Duration,
    /// Durable error log. Default: [`MemoryErrorStore`].
    pub error_store: Arc<dyn ErrorStore>,
    /// Optional event handler for live log views and lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            retry: None,
            timeout: None,
            error_store: None,
            event_handler: None,
        }
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Absolute URL for a known endpoint.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        self.url(endpoint.path())
    }

    /// Ping the service root (`GET /`) and return its JSON reply.
    pub async fn check_health(&self) -> Result<Value> {
        let url = self.url("/");
        let resp = tokio::time::timeout(self.timeout, self.backend.get(&self.client, &url))
            .await
            .map_err(|_| PipelineError::Transport(Some("health check timed out".into())))??;
        if !resp.is_success() {
            return Err(PipelineError::Other(format!(
                "health check returned HTTP {}",
                resp.status
            )));
        }
        Ok(serde_json::from_str(&resp.body)?)
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("error_store", &self.error_store.name())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    error_store: Option<Arc<dyn ErrorStore>>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the backend. Default: [`HttpBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the retry policy. Default: [`RetryPolicy::default()`].
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Set the per-attempt timeout. Default: 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the durable error store. Default: in-memory.
    pub fn error_store(mut self, store: Arc<dyn ErrorStore>) -> Self {
        self.error_store = Some(store);
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> ExecCtx {
        ExecCtx {
            client: self.client.unwrap_or_default(),
            base_url: normalize_base_url(&self.base_url),
            backend: self.backend.unwrap_or_else(|| Arc::new(HttpBackend)),
            retry: self.retry.unwrap_or_default(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            error_store: self
                .error_store
                .unwrap_or_else(|| Arc::new(MemoryErrorStore::new())),
            event_handler: self.event_handler,
        }
    }
}

/// Strip trailing slashes and a known endpoint path from a base URL.
/// e.g. "http://host:5000/linkedin" -> "http://host:5000"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    for endpoint in Endpoint::ALL {
        if let Some(stripped) = trimmed.strip_suffix(endpoint.path()) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_normalize_base_url_trailing_slash() {
        assert_eq!(normalize_base_url("http://localhost:5000/"), "http://localhost:5000");
        assert_eq!(normalize_base_url("http://localhost:5000"), "http://localhost:5000");
    }

    #[test]
    fn test_normalize_base_url_strips_endpoint() {
        assert_eq!(
            normalize_base_url("http://localhost:5000/twitter"),
            "http://localhost:5000"
        );
        assert_eq!(
            normalize_base_url("http://localhost:5000/generate_image_yt/"),
            "http://localhost:5000"
        );
    }

    #[test]
    fn test_url_joins_paths() {
        let ctx = ExecCtx::builder("http://localhost:5000/").build();
        assert_eq!(ctx.url("/youtube"), "http://localhost:5000/youtube");
        assert_eq!(ctx.url("youtube"), "http://localhost:5000/youtube");
        assert_eq!(
            ctx.endpoint_url(Endpoint::TwitterThread),
            "http://localhost:5000/twitter-thread"
        );
    }

    #[test]
    fn test_defaults() {
        let ctx = ExecCtx::builder("http://localhost:5000").build();
        assert_eq!(ctx.timeout, Duration::from_millis(30_000));
        assert_eq!(ctx.retry.max_retries, 2);
        assert_eq!(ctx.backend.name(), "http");
        assert_eq!(ctx.error_store.name(), "memory");
    }

    #[tokio::test]
    async fn test_check_health_with_mock() {
        let mock = Arc::new(MockBackend::new());
        let ctx = ExecCtx::builder("http://unused").backend(mock.clone()).build();
        let reply = ctx.check_health().await.unwrap();
        assert_eq!(reply["message"], "API is working");
        assert_eq!(mock.calls()[0].url, "http://unused/");
    }
}
