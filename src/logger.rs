//! Structured session log.
//!
//! [`SessionLog`] is the observable, append-only sequence of [`LogEntry`]s
//! for the current submission. [`StructuredLogger`] writes to it on behalf of
//! one submission, mirrors every entry to `tracing`, forwards it to the event
//! handler, and persists error records to the durable [`ErrorStore`].

use crate::events::{emit, Event, EventHandler};
use crate::operation::SubmissionTicket;
use crate::store::ErrorStore;
use crate::types::ErrorRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    /// A step is in progress.
    Process,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Process => "PROCESS",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One immutable entry in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Short label for the pipeline step, e.g. `"request"` or `"retry"`.
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Append-only, chronologically ordered log for the current submission.
#[derive(Debug, Default)]
pub struct SessionLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry for `ticket`'s submission, stamped with the current
    /// time. Returns `None` without appending if the submission has been
    /// superseded.
    ///
    /// The currency check and the timestamp are both taken under the lock,
    /// and the timestamp never goes below the previous entry's.
    pub(crate) fn push(
        &self,
        ticket: &SubmissionTicket,
        level: LogLevel,
        stage: &str,
        message: String,
        data: Option<Value>,
    ) -> Option<LogEntry> {
        let mut entries = self.lock();
        if !ticket.is_current() {
            return None;
        }
        let now = Utc::now();
        let entry = LogEntry {
            timestamp: entries.last().map_or(now, |prev| prev.timestamp.max(now)),
            level,
            stage: stage.to_string(),
            message,
            data,
        };
        entries.push(entry.clone());
        Some(entry)
    }

    /// Claim the next submission and clear the log in one step.
    pub(crate) fn begin_submission(&self, latest: &Arc<AtomicU64>) -> SubmissionTicket {
        let mut entries = self.lock();
        let ticket = SubmissionTicket::next(latest);
        entries.clear();
        ticket
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Entries appended after the first `seen`, for incremental consumers.
    pub fn entries_since(&self, seen: usize) -> Vec<LogEntry> {
        let entries = self.lock();
        entries.get(seen..).map(<[LogEntry]>::to_vec).unwrap_or_default()
    }

    pub fn last(&self) -> Option<LogEntry> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Logger bound to one submission.
///
/// Writes from a superseded submission still reach `tracing` but are kept
/// out of the session log.
#[derive(Clone)]
pub struct StructuredLogger {
    session: Arc<SessionLog>,
    store: Arc<dyn ErrorStore>,
    handler: Option<Arc<dyn EventHandler>>,
    ticket: SubmissionTicket,
}

impl StructuredLogger {
    pub(crate) fn new(
        session: Arc<SessionLog>,
        store: Arc<dyn ErrorStore>,
        handler: Option<Arc<dyn EventHandler>>,
        ticket: SubmissionTicket,
    ) -> Self {
        Self {
            session,
            store,
            handler,
            ticket,
        }
    }

    pub fn session(&self) -> &Arc<SessionLog> {
        &self.session
    }

    /// Append a log entry for this submission.
    pub fn add_log(
        &self,
        level: LogLevel,
        stage: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let message = message.into();
        let submission = self.ticket.id();
        match level {
            LogLevel::Error => tracing::error!(submission, stage, "{}", message),
            LogLevel::Warning => tracing::warn!(submission, stage, "{}", message),
            LogLevel::Info | LogLevel::Process | LogLevel::Success => {
                tracing::info!(submission, stage, level = %level, "{}", message)
            }
        }

        if let Some(entry) = self.session.push(&self.ticket, level, stage, message, data) {
            emit(&self.handler, Event::Log { submission, entry });
        }
    }

    /// Record a failed attempt in the session log and the durable store.
    ///
    /// A store failure is logged and swallowed.
    pub async fn log_error(&self, record: &ErrorRecord) {
        self.add_log(
            LogLevel::Error,
            "error",
            format!("{}: {}", record.kind, record.message),
            serde_json::to_value(record).ok(),
        );

        if let Err(e) = self.store.append(record).await {
            self.add_log(
                LogLevel::Error,
                "error-store",
                format!("Failed to persist error log: {}", e),
                Some(serde_json::json!({ "store": self.store.name(), "record_id": record.id })),
            );
        }
    }
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("submission", &self.ticket.id())
            .field("store", &self.store.name())
            .field("entries", &self.session.len())
            .field("has_event_handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, AttemptFailure};
    use crate::error::Result;
    use crate::events::FnEventHandler;
    use crate::store::MemoryErrorStore;
    use crate::types::RequestPayload;
    use crate::PipelineError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl ErrorStore for BrokenStore {
        async fn append(&self, _record: &ErrorRecord) -> Result<()> {
            Err(PipelineError::Other("disk full".into()))
        }
        async fn load(&self) -> Result<Vec<ErrorRecord>> {
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn logger(store: Arc<dyn ErrorStore>) -> StructuredLogger {
        let ticket = SubmissionTicket::first(Arc::new(AtomicU64::new(0)));
        StructuredLogger::new(Arc::new(SessionLog::new()), store, None, ticket)
    }

    fn record() -> ErrorRecord {
        ErrorRecord::new(
            "http://api/instagram",
            RequestPayload::single("input_text", "x"),
            classify(&AttemptFailure::Status(404)),
            Duration::from_millis(3),
            0,
        )
    }

    #[test]
    fn test_add_log_appends_in_order() {
        let log = logger(Arc::new(MemoryErrorStore::new()));
        log.add_log(LogLevel::Process, "init", "Initializing generation process...", None);
        log.add_log(LogLevel::Info, "request", "Sending prompt", None);
        log.add_log(LogLevel::Success, "response", "done", None);

        let entries = log.session().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].stage, "init");
        assert_eq!(entries[2].level, LogLevel::Success);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_entries_since() {
        let log = logger(Arc::new(MemoryErrorStore::new()));
        log.add_log(LogLevel::Info, "a", "one", None);
        let seen = log.session().len();
        log.add_log(LogLevel::Info, "b", "two", None);

        let fresh = log.session().entries_since(seen);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "two");
        assert!(log.session().entries_since(10).is_empty());
    }

    #[tokio::test]
    async fn test_log_error_persists() {
        let store = Arc::new(MemoryErrorStore::new());
        let log = logger(store.clone());
        let rec = record();
        log.log_error(&rec).await;

        assert_eq!(store.load().await.unwrap(), vec![rec]);
        let last = log.session().last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert_eq!(last.message, "ApiError: HTTP Error 404");
    }

    #[tokio::test]
    async fn test_store_failure_is_logged_not_raised() {
        let log = logger(Arc::new(BrokenStore));
        log.log_error(&record()).await;

        let entries = log.session().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].stage, "error-store");
        assert!(entries[1].message.contains("disk full"));
    }

    #[test]
    fn test_level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(LogLevel::Process).unwrap(),
            serde_json::json!("process")
        );
    }

    #[test]
    fn test_add_log_emits_one_event_per_entry() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |e: Event| {
            sink.lock().unwrap().push(e);
        }));
        let ticket = SubmissionTicket::first(Arc::new(AtomicU64::new(0)));
        let log = StructuredLogger::new(
            Arc::new(SessionLog::new()),
            Arc::new(MemoryErrorStore::new()),
            Some(handler),
            ticket,
        );

        log.add_log(LogLevel::Process, "init", "first", None);
        log.add_log(LogLevel::Success, "complete", "second", None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let entries = log.session().entries();
        for (event, expected) in seen.iter().zip(&entries) {
            match event {
                Event::Log { submission, entry } => {
                    assert_eq!(*submission, 1);
                    assert_eq!(entry, expected);
                }
                other => panic!("expected a log event, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_stale_ticket_cannot_write_after_new_submission() {
        let latest = Arc::new(AtomicU64::new(0));
        let log = SessionLog::new();
        let old = log.begin_submission(&latest);
        assert!(log.push(&old, LogLevel::Info, "request", "old".into(), None).is_some());

        let new = log.begin_submission(&latest);
        assert!(log.is_empty());
        assert!(log.push(&old, LogLevel::Info, "request", "stale".into(), None).is_none());
        assert!(log.push(&new, LogLevel::Info, "request", "fresh".into(), None).is_some());
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_concurrent_stale_writes_never_leak() {
        let latest = Arc::new(AtomicU64::new(0));
        let log = SessionLog::new();
        for _ in 0..200 {
            let old = log.begin_submission(&latest);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..50 {
                        log.push(&old, LogLevel::Info, "request", "stale".into(), None);
                    }
                });
                log.begin_submission(&latest);
            });
            assert!(log.entries().iter().all(|e| e.message != "stale"));
        }
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let ticket = SubmissionTicket::first(Arc::new(AtomicU64::new(0)));
        let log = SessionLog::new();
        let ahead = Utc::now() + chrono::Duration::hours(1);
        log.lock().push(LogEntry {
            timestamp: ahead,
            level: LogLevel::Info,
            stage: "request".into(),
            message: "stamped before a clock step".into(),
            data: None,
        });

        let entry = log
            .push(&ticket, LogLevel::Info, "attempt", "next".into(), None)
            .unwrap();
        assert_eq!(entry.timestamp, ahead);
    }
}
