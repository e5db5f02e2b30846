//! Generation call — the request orchestrator.
//!
//! [`GenerateCall`] runs one logical "generate content" operation against an
//! endpoint: validate the input, then attempt under the timeout guard,
//! classify failures, record them, and retry per the [`RetryPolicy`] until
//! the call succeeds or the policy says stop.
//!
//! [`RetryPolicy`]: crate::retry::RetryPolicy

use crate::{
    classify::{classify, inspect_response, AttemptFailure},
    error::Result,
    exec_ctx::ExecCtx,
    logger::LogLevel,
    operation::{Operation, OperationState},
    platform::Endpoint,
    timeout::{TimedOut, TimeoutGuard},
    types::{ErrorRecord, GenerationResult, RequestPayload},
    PipelineError,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// A call to one generation endpoint.
///
/// # Example
///
/// ```ignore
/// use content_gen_pipeline::{ExecCtx, GenerateCall, Session};
///
/// let ctx = ExecCtx::builder("http://localhost:5000").build();
/// let session = Session::new();
/// let op = session.begin(&ctx, "linkedin");
///
/// let call = GenerateCall::new("linkedin", "/linkedin");
/// let result = call.execute(&ctx, &op, "Ethereum staking explained").await?;
/// println!("{:?}", result.text("linkedin_text"));
/// ```
#[derive(Debug, Clone)]
pub struct GenerateCall {
    /// Instance name (for logs and events).
    name: String,
    /// Endpoint path relative to the context's base URL.
    path: String,
    /// Request body field carrying the user text.
    input_field: String,
}

impl GenerateCall {
    /// Create a call posting `{"input_text": ...}` to `path`.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            input_field: "input_text".to_string(),
        }
    }

    /// Call a known endpoint with its usual input field.
    pub fn for_endpoint(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self::new(name, endpoint.path()).with_input_field(endpoint.input_field())
    }

    /// Set the request body field (e.g. `"prompt"`).
    pub fn with_input_field(mut self, field: impl Into<String>) -> Self {
        self.input_field = field.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn input_field(&self) -> &str {
        &self.input_field
    }

    /// Run the call to a terminal state.
    ///
    /// Returns the decoded result, [`PipelineError::Generation`] carrying the
    /// final error record, or [`PipelineError::Superseded`] if a newer
    /// submission started meanwhile.
    #[instrument(skip_all, fields(call = %self.name, submission = op.submission()))]
    pub async fn execute(
        &self,
        ctx: &ExecCtx,
        op: &Operation,
        input: &str,
    ) -> Result<GenerationResult> {
        let log = op.logger();
        let url = ctx.url(&self.path);

        op.transition(OperationState::Validating);
        let text = input.trim();
        let payload = RequestPayload::single(&self.input_field, text);
        if text.is_empty() {
            let record = ErrorRecord::new(
                &url,
                payload,
                classify(&AttemptFailure::EmptyInput),
                Duration::ZERO,
                0,
            );
            log.log_error(&record).await;
            return Err(self.fail(op, record, 0));
        }

        log.add_log(
            LogLevel::Info,
            "request",
            format!("Sending prompt: \"{}\"", text),
            Some(json!({ "endpoint": url, "payload": payload })),
        );

        let guard = TimeoutGuard::new(ctx.timeout);
        let total = ctx.retry.max_attempts();
        let mut retry_count: u32 = 0;

        loop {
            ensure_current(op)?;
            op.transition(OperationState::Attempting {
                attempt: retry_count,
            });
            log.add_log(
                LogLevel::Info,
                "attempt",
                format!("Starting attempt {}/{}", retry_count + 1, total),
                None,
            );

            let started = Instant::now();
            let outcome = guard
                .run(ctx.backend.post(&ctx.client, &url, &payload))
                .await;
            let elapsed = started.elapsed();
            ensure_current(op)?;

            let failure = match outcome {
                Ok(Ok(response)) => match inspect_response(response.status, &response.body) {
                    Ok(result) => {
                        log.add_log(
                            LogLevel::Success,
                            "complete",
                            format!("{} generated successfully", self.name),
                            Some(result.to_value()),
                        );
                        op.transition(OperationState::Succeeded);
                        return Ok(result);
                    }
                    Err(failure) => failure,
                },
                Ok(Err(err)) => AttemptFailure::from_transport(&err),
                Err(TimedOut { .. }) => AttemptFailure::TimedOut,
            };

            op.transition(OperationState::Classifying {
                attempt: retry_count,
            });
            let classification = classify(&failure);
            let decision = ctx.retry.decide(&classification, retry_count);
            let record = ErrorRecord::new(&url, payload.clone(), classification, elapsed, retry_count);
            log.log_error(&record).await;

            if !decision.should_retry {
                return Err(self.fail(op, record, retry_count + 1));
            }

            let delay_ms = u64::try_from(decision.delay.as_millis()).unwrap_or(u64::MAX);
            op.transition(OperationState::RetryWaiting {
                attempt: retry_count,
                delay: decision.delay,
            });
            log.add_log(
                LogLevel::Warning,
                "retry",
                format!(
                    "{}; retrying in {}ms (attempt {}/{})",
                    record.message,
                    delay_ms,
                    retry_count + 2,
                    total
                ),
                Some(json!({ "delay_ms": delay_ms, "kind": record.kind })),
            );
            tokio::time::sleep(decision.delay).await;
            retry_count += 1;
        }
    }

    /// Log the terminal failure and hand back the error carrying `record`.
    fn fail(&self, op: &Operation, record: ErrorRecord, attempts: u32) -> PipelineError {
        op.logger().add_log(
            LogLevel::Error,
            "complete",
            format!(
                "{} failed after {} attempt(s): {}",
                self.name, attempts, record.message
            ),
            Some(json!({ "id": record.id, "kind": record.kind, "retry_count": record.retry_count })),
        );
        op.transition(OperationState::Failed);
        PipelineError::Generation(Box::new(record))
    }
}

fn ensure_current(op: &Operation) -> Result<()> {
    op.check_current().inspect_err(|_| {
        op.transition(OperationState::Failed);
    })
}
