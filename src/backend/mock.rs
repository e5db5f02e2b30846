//! Mock backend for testing without a live generation service.
//!
//! [`MockBackend`] replays scripted [`MockStep`]s per route, allowing
//! deterministic tests of retries, timeouts and chained calls.
//!
//! # Example
//!
//! ```
//! use content_gen_pipeline::backend::{MockBackend, MockStep};
//! use serde_json::json;
//!
//! let mock = MockBackend::new()
//!     .route("/twitter", vec![
//!         MockStep::status(429),
//!         MockStep::json(200, json!({"tweet_text": "gm"})),
//!     ]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{Backend, BackendResponse};
use crate::error::Result;
use crate::types::RequestPayload;
use crate::PipelineError;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Reply with a status and raw body.
    Respond { status: u16, body: String },
    /// Fail as if the connection was refused.
    Refused,
    /// Fail with a generic transport error.
    Transport(Option<String>),
    /// Never reply.
    Hang,
}

impl MockStep {
    pub fn json(status: u16, body: Value) -> Self {
        MockStep::Respond {
            status,
            body: body.to_string(),
        }
    }

    /// A bare status with an empty body.
    pub fn status(status: u16) -> Self {
        MockStep::Respond {
            status,
            body: String::new(),
        }
    }
}

/// A call observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub payload: Option<RequestPayload>,
    pub at: tokio::time::Instant,
}

/// A test backend that replays scripted outcomes.
///
/// Each route (matched as a URL suffix) has its own queue. Steps are
/// consumed in order and the last step repeats once the queue is down to
/// one. Unrouted URLs fall back to [`fallback`](Self::fallback), or 404.
#[derive(Debug, Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<String, VecDeque<MockStep>>>,
    fallback: Option<MockStep>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that answers every route with the same JSON body.
    pub fn fixed(body: Value) -> Self {
        Self::new().fallback(MockStep::json(200, body))
    }

    /// Script the outcomes for URLs ending in `path`.
    pub fn route(self, path: impl Into<String>, steps: Vec<MockStep>) -> Self {
        if !steps.is_empty() {
            self.routes
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .insert(path.into(), steps.into());
        }
        self
    }

    /// Outcome for URLs with no route.
    pub fn fallback(mut self, step: MockStep) -> Self {
        self.fallback = Some(step);
        self
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of calls whose URL ends in `path`.
    pub fn call_count(&self, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.url.ends_with(path))
            .count()
    }

    fn next_step(&self, url: &str) -> MockStep {
        let mut routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
        let queue = routes
            .iter_mut()
            .filter(|(path, _)| url.ends_with(path.as_str()))
            .max_by_key(|(path, _)| path.len())
            .map(|(_, queue)| queue);

        let scripted = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        scripted
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| MockStep::status(404))
    }

    fn record(&self, url: &str, payload: Option<&RequestPayload>) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RecordedCall {
                url: url.to_string(),
                payload: payload.cloned(),
                at: tokio::time::Instant::now(),
            });
    }

    async fn play(step: MockStep) -> Result<BackendResponse> {
        match step {
            MockStep::Respond { status, body } => Ok(BackendResponse { status, body }),
            MockStep::Refused => Err(PipelineError::Connect("connection refused".into())),
            MockStep::Transport(message) => Err(PipelineError::Transport(message)),
            MockStep::Hang => {
                std::future::pending::<()>().await;
                Err(PipelineError::Transport(None))
            }
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn post(
        &self,
        _client: &Client,
        url: &str,
        payload: &RequestPayload,
    ) -> Result<BackendResponse> {
        self.record(url, Some(payload));
        let step = self.next_step(url);
        Self::play(step).await
    }

    async fn get(&self, _client: &Client, url: &str) -> Result<BackendResponse> {
        self.record(url, None);
        Ok(BackendResponse {
            status: 200,
            body: json!({"message": "API is working"}).to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
