//! Transport seam for generation endpoints.
//!
//! The [`Backend`] trait performs one raw HTTP exchange. It does not
//! interpret status codes or bodies: a non-2xx reply is still `Ok`, and only
//! transport-level problems are errors. Interpretation happens in
//! [`classify`](crate::classify).
//!
//! ```text
//! GenerateCall ──► TimeoutGuard ──► Backend::post() ──► BackendResponse
//!                                          │
//!                              ┌───────────┴───────────┐
//!                         HttpBackend              MockBackend
//!                       reqwest POST/GET        scripted outcomes
//! ```

pub mod http;
pub mod mock;

pub use http::HttpBackend;
pub use mock::{MockBackend, MockStep};

use crate::error::Result;
use crate::types::RequestPayload;
use async_trait::async_trait;
use reqwest::Client;

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the transport used to reach the generation service.
///
/// Errors are reserved for transport failures: use
/// [`PipelineError::Request`](crate::PipelineError::Request) for `reqwest`
/// errors, [`PipelineError::Connect`](crate::PipelineError::Connect) for
/// connectivity failures, and
/// [`PipelineError::Transport`](crate::PipelineError::Transport) otherwise.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST` a JSON payload to `url`.
    async fn post(
        &self,
        client: &Client,
        url: &str,
        payload: &RequestPayload,
    ) -> Result<BackendResponse>;

    /// `GET` `url` (used for health checks).
    async fn get(&self, client: &Client, url: &str) -> Result<BackendResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}
