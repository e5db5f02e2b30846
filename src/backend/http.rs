//! Backend that talks to the generation service over HTTP.

use super::{Backend, BackendResponse};
use crate::error::Result;
use crate::types::RequestPayload;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// `reqwest`-based backend. Sends `Content-Type: application/json` bodies.
#[derive(Debug, Clone, Default)]
pub struct HttpBackend;

impl HttpBackend {
    async fn read(resp: reqwest::Response) -> Result<BackendResponse> {
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(BackendResponse { status, body })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn post(
        &self,
        client: &Client,
        url: &str,
        payload: &RequestPayload,
    ) -> Result<BackendResponse> {
        debug!(url, "POST");
        let resp = client.post(url).json(payload).send().await?;
        Self::read(resp).await
    }

    async fn get(&self, client: &Client, url: &str) -> Result<BackendResponse> {
        debug!(url, "GET");
        let resp = client.get(url).send().await?;
        Self::read(resp).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AttemptFailure;

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let client = Client::new();
        let err = HttpBackend
            .post(
                &client,
                "http://127.0.0.1:9/linkedin",
                &RequestPayload::single("input_text", "x"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            AttemptFailure::from_transport(&err),
            AttemptFailure::Connect { .. } | AttemptFailure::Transport(_)
        ));
    }
}
