//! Durable error log.
//!
//! Every failed attempt's [`ErrorRecord`] is appended to an [`ErrorStore`]
//! so it survives the session. Stores are bounded: once `capacity` records
//! are held, the oldest are evicted first.

use crate::error::Result;
use crate::PipelineError;
use crate::types::ErrorRecord;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Default number of records kept by the built-in stores.
pub const DEFAULT_CAPACITY: usize = 200;

/// Append-only, cross-session collection of error records.
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Append one record, evicting the oldest if the store is full.
    async fn append(&self, record: &ErrorRecord) -> Result<()>;

    /// All retained records, oldest first.
    async fn load(&self) -> Result<Vec<ErrorRecord>>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// In-memory store. Lives as long as the process.
#[derive(Debug)]
pub struct MemoryErrorStore {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
}

impl MemoryErrorStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryErrorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ErrorStore for MemoryErrorStore {
    async fn append(&self, record: &ErrorRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push_back(record.clone());
        while records.len() > self.capacity {
            records.pop_front();
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<ErrorRecord>> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.iter().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store backed by a single JSON array file.
///
/// Each append is a read-modify-write of the whole blob, serialized through
/// an async mutex. Not safe across processes.
#[derive(Debug)]
pub struct JsonFileErrorStore {
    path: PathBuf,
    capacity: usize,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileErrorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<ErrorRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(Vec::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`read_all`](Self::read_all), but a blob that no longer parses
    /// is moved to `<path>.corrupt` and replaced by an empty log.
    async fn read_or_recover(&self) -> Result<Vec<ErrorRecord>> {
        match self.read_all().await {
            Err(e @ PipelineError::Json(_)) => self.set_aside(e).await,
            Err(PipelineError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                self.set_aside(PipelineError::Io(e)).await
            }
            other => other,
        }
    }

    async fn set_aside(&self, e: PipelineError) -> Result<Vec<ErrorRecord>> {
        let aside = self.sibling("corrupt");
        tokio::fs::rename(&self.path, &aside).await?;
        warn!(
            path = %self.path.display(),
            moved_to = %aside.display(),
            error = %e,
            "Error log was unreadable, starting a fresh one"
        );
        Ok(Vec::new())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Replace the blob in one rename so readers never see a partial write.
    async fn write_all(&self, records: &[ErrorRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.sibling("tmp");
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ErrorStore for JsonFileErrorStore {
    async fn append(&self, record: &ErrorRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_or_recover().await?;
        records.push(record.clone());
        if records.len() > self.capacity {
            let excess = records.len() - self.capacity;
            records.drain(..excess);
            debug!(path = %self.path.display(), evicted = excess, "Evicted old error records");
        }
        self.write_all(&records).await
    }

    async fn load(&self) -> Result<Vec<ErrorRecord>> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, AttemptFailure};
    use crate::types::RequestPayload;
    use std::time::Duration;

    fn record(status: u16) -> ErrorRecord {
        ErrorRecord::new(
            "http://api/twitter",
            RequestPayload::single("input_text", "eth merge"),
            classify(&AttemptFailure::Status(status)),
            Duration::from_millis(5),
            0,
        )
    }

    #[tokio::test]
    async fn test_memory_store_appends_in_order() {
        let store = MemoryErrorStore::new();
        store.append(&record(404)).await.unwrap();
        store.append(&record(500)).await.unwrap();
        let all = store.load().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status_code, Some(404));
        assert_eq!(all[1].status_code, Some(500));
    }

    #[tokio::test]
    async fn test_memory_store_evicts_oldest() {
        let store = MemoryErrorStore::with_capacity(2);
        for status in [400, 401, 402] {
            store.append(&record(status)).await.unwrap();
        }
        let all = store.load().await.unwrap();
        let statuses: Vec<_> = all.iter().filter_map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![401, 402]);
    }

    #[tokio::test]
    async fn test_file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("errors.json");

        let store = JsonFileErrorStore::new(&path);
        assert!(store.load().await.unwrap().is_empty());
        let first = record(429);
        store.append(&first).await.unwrap();
        store.append(&record(503)).await.unwrap();

        // A fresh instance sees what the previous session wrote.
        let reopened = JsonFileErrorStore::new(&path);
        let all = reopened.load().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);
    }

    #[tokio::test]
    async fn test_file_store_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileErrorStore::with_capacity(dir.path().join("errors.json"), 3);
        for status in 400..406 {
            store.append(&record(status)).await.unwrap();
        }
        let statuses: Vec<_> = store
            .load()
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.status_code)
            .collect();
        assert_eq!(statuses, vec![403, 404, 405]);
    }

    #[tokio::test]
    async fn test_file_store_recovers_from_truncated_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.json");
        std::fs::write(&path, r#"[{"id":"a""#).unwrap();
        let store = JsonFileErrorStore::new(&path);

        for status in 400..405 {
            tokio_test::assert_ok!(store.append(&record(status)).await);
        }
        let all = tokio_test::assert_ok!(store.load().await);
        assert_eq!(all.len(), 5);

        let aside = dir.path().join("errors.json.corrupt");
        assert_eq!(std::fs::read_to_string(aside).unwrap(), r#"[{"id":"a""#);
        assert!(!dir.path().join("errors.json.tmp").exists());
    }
}
