//! Per-submission operation context.
//!
//! A [`Session`] owns the live [`SessionLog`] and hands out one [`Operation`]
//! per user submission. Beginning a new submission clears the log and
//! supersedes every earlier one (last submission wins): superseded
//! operations stop before their next attempt and no longer write to the log.

use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use crate::exec_ctx::ExecCtx;
use crate::logger::{SessionLog, StructuredLogger};
use crate::PipelineError;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// States of the request orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    Idle,
    Validating,
    /// Attempt `attempt` (0-based) is in flight.
    Attempting { attempt: u32 },
    /// A failed attempt is being classified.
    Classifying { attempt: u32 },
    /// Waiting out the backoff before attempt `attempt + 1`.
    RetryWaiting {
        attempt: u32,
        #[serde(rename = "delay_ms")]
        #[serde(serialize_with = "serialize_millis")]
        delay: Duration,
    },
    Succeeded,
    Failed,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

/// Identifies one submission and whether it is still the latest.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    id: u64,
    latest: Arc<AtomicU64>,
}

impl SubmissionTicket {
    /// Claim the next submission id, superseding all earlier tickets.
    pub(crate) fn next(latest: &Arc<AtomicU64>) -> Self {
        let id = latest.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            id,
            latest: latest.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn first(latest: Arc<AtomicU64>) -> Self {
        Self::next(&latest)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }
}

/// Owner of the live log and the submission counter.
///
/// # Example
///
/// ```
/// use content_gen_pipeline::{ExecCtx, MockBackend, Session};
/// use std::sync::Arc;
///
/// let ctx = ExecCtx::builder("http://unused")
///     .backend(Arc::new(MockBackend::new()))
///     .build();
/// let session = Session::new();
/// let first = session.begin(&ctx, "twitter");
/// let second = session.begin(&ctx, "twitter");
/// assert!(first.is_superseded());
/// assert!(!second.is_superseded());
/// ```
#[derive(Debug, Default)]
pub struct Session {
    log: Arc<SessionLog>,
    latest: Arc<AtomicU64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live log, shared by every operation of this session.
    pub fn log(&self) -> &Arc<SessionLog> {
        &self.log
    }

    /// Id of the most recent submission (0 before the first).
    pub fn latest_submission(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Start a new top-level operation: clears the log and supersedes
    /// earlier submissions.
    pub fn begin(&self, ctx: &ExecCtx, name: impl Into<String>) -> Operation {
        let name = name.into();
        let ticket = self.log.begin_submission(&self.latest);
        debug!(submission = ticket.id(), name = %name, "Beginning operation");
        emit(
            &ctx.event_handler,
            Event::OperationStart {
                submission: ticket.id(),
                name: name.clone(),
            },
        );
        let logger = StructuredLogger::new(
            self.log.clone(),
            ctx.error_store.clone(),
            ctx.event_handler.clone(),
            ticket.clone(),
        );
        Operation::new(name, ticket, logger, ctx.event_handler.clone())
    }
}

/// Context object threaded through one run of the orchestrator.
pub struct Operation {
    name: String,
    ticket: SubmissionTicket,
    logger: StructuredLogger,
    handler: Option<Arc<dyn EventHandler>>,
    state: Mutex<OperationState>,
}

impl Operation {
    fn new(
        name: String,
        ticket: SubmissionTicket,
        logger: StructuredLogger,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            name,
            ticket,
            logger,
            handler,
            state: Mutex::new(OperationState::Idle),
        }
    }

    /// A dependent operation for the same submission (e.g. image after
    /// text). Shares the log; starts from [`OperationState::Idle`].
    pub fn chained(&self, name: impl Into<String>) -> Operation {
        Operation::new(
            name.into(),
            self.ticket.clone(),
            self.logger.clone(),
            self.handler.clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn submission(&self) -> u64 {
        self.ticket.id()
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn is_superseded(&self) -> bool {
        !self.ticket.is_current()
    }

    /// Return an error if a newer submission has started.
    pub fn check_current(&self) -> Result<()> {
        if self.is_superseded() {
            return Err(PipelineError::Superseded {
                submission: self.ticket.id(),
            });
        }
        Ok(())
    }

    pub fn state(&self) -> OperationState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn transition(&self, next: OperationState) {
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            debug!(
                submission = self.ticket.id(),
                name = %self.name,
                from = ?*state,
                to = ?next,
                "State transition"
            );
            *state = next;
        }
        emit(
            &self.handler,
            Event::StateChanged {
                submission: self.ticket.id(),
                name: self.name.clone(),
                state: next,
            },
        );
        if next.is_terminal() {
            emit(
                &self.handler,
                Event::OperationEnd {
                    submission: self.ticket.id(),
                    name: self.name.clone(),
                    ok: next == OperationState::Succeeded,
                },
            );
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("submission", &self.ticket.id())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::events::FnEventHandler;
    use crate::logger::LogLevel;

    fn ctx() -> ExecCtx {
        ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::new()))
            .build()
    }

    #[test]
    fn test_begin_clears_log() {
        let ctx = ctx();
        let session = Session::new();
        let op = session.begin(&ctx, "linkedin");
        op.logger().add_log(LogLevel::Info, "request", "hello", None);
        assert_eq!(session.log().len(), 1);

        let _next = session.begin(&ctx, "linkedin");
        assert!(session.log().is_empty());
    }

    #[test]
    fn test_superseded_operation_is_silenced() {
        let ctx = ctx();
        let session = Session::new();
        let old = session.begin(&ctx, "twitter");
        let new = session.begin(&ctx, "twitter");

        assert_eq!(session.latest_submission(), 2);
        assert!(matches!(
            old.check_current(),
            Err(PipelineError::Superseded { submission: 1 })
        ));
        tokio_test::assert_ok!(new.check_current());

        old.logger().add_log(LogLevel::Info, "request", "stale", None);
        new.logger().add_log(LogLevel::Info, "request", "fresh", None);
        let messages: Vec<_> = session.log().entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["fresh"]);
    }

    #[test]
    fn test_chained_shares_submission_and_resets_state() {
        let ctx = ctx();
        let session = Session::new();
        let op = session.begin(&ctx, "linkedin");
        op.transition(OperationState::Succeeded);

        let image = op.chained("linkedin-image");
        assert_eq!(image.submission(), op.submission());
        assert_eq!(image.state(), OperationState::Idle);
    }

    #[test]
    fn test_transitions_emit_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::new()))
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e);
            })))
            .build();

        let session = Session::new();
        let op = session.begin(&ctx, "youtube");
        op.transition(OperationState::Validating);
        op.transition(OperationState::Failed);

        let events = events.lock().unwrap();
        assert!(matches!(events[0], Event::OperationStart { submission: 1, .. }));
        assert!(matches!(
            events[1],
            Event::StateChanged {
                state: OperationState::Validating,
                ..
            }
        ));
        assert!(matches!(events.last(), Some(Event::OperationEnd { ok: false, .. })));
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let state = OperationState::RetryWaiting {
            attempt: 1,
            delay: Duration::from_millis(2000),
        };
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            serde_json::json!({"state": "retry_waiting", "attempt": 1, "delay_ms": 2000})
        );
    }
}
