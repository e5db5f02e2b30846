use crate::classify::{Classification, ErrorKind};
use crate::error::Result;
use crate::PipelineError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

/// Body sent to a generation endpoint.
///
/// Built once per logical call; every retry sends the same payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestPayload {
    fields: Map<String, Value>,
}

impl RequestPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload with a single field, e.g. `{"input_text": "..."}`.
    pub fn single(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(field, value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Decoded JSON object returned by a successful generation call.
///
/// No schema is enforced beyond "is an object without a top-level `error`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationResult {
    fields: Map<String, Value>,
}

impl GenerationResult {
    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String value of `field`, if present, a string, and not blank.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Parse the result into a typed `T`.
    ///
    /// ```ignore
    /// let post: LinkedInPost = result.parse_as()?;
    /// ```
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_value()).map_err(|e| {
            let snippet = self.to_value().to_string();
            let snippet: String = snippet.chars().take(200).collect();
            PipelineError::Other(format!(
                "Failed to parse GenerationResult into target type: {}. Value (truncated): {}",
                e, snippet
            ))
        })
    }
}

/// One failed attempt, as recorded in the session log and the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub request_payload: RequestPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub duration_ms: u64,
    pub retry_count: u32,
}

impl ErrorRecord {
    /// Build a record for a classified failure with a fresh id and timestamp.
    pub fn new(
        endpoint: impl Into<String>,
        request_payload: RequestPayload,
        classification: Classification,
        duration: Duration,
        retry_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            endpoint: endpoint.into(),
            request_payload,
            status_code: classification.status_code,
            kind: classification.kind,
            message: classification.message,
            details: classification.details,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            retry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, AttemptFailure};
    use serde_json::json;

    #[test]
    fn test_payload_serializes_as_flat_object() {
        let payload = RequestPayload::single("input_text", "bitcoin halving");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"input_text": "bitcoin halving"})
        );
    }

    #[test]
    fn test_result_text_skips_blank_and_non_strings() {
        let map = json!({"tweet_text": "gm", "image_description": "  ", "count": 3});
        let result = GenerationResult::from_map(map.as_object().cloned().unwrap());
        assert_eq!(result.text("tweet_text"), Some("gm"));
        assert_eq!(result.text("image_description"), None);
        assert_eq!(result.text("count"), None);
        assert_eq!(result.text("missing"), None);
    }

    #[test]
    fn test_result_parse_as() {
        #[derive(Deserialize)]
        struct Video {
            title: String,
        }
        let map = json!({"title": "Intro", "description": "d", "thumbnail": "t"});
        let result = GenerationResult::from_map(map.as_object().cloned().unwrap());
        let video: Video = result.parse_as().unwrap();
        assert_eq!(video.title, "Intro");
    }

    #[test]
    fn test_error_record_uses_camel_case() {
        let record = ErrorRecord::new(
            "http://api/linkedin",
            RequestPayload::single("input_text", "x"),
            classify(&AttemptFailure::Status(404)),
            Duration::from_millis(12),
            1,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["statusCode"], 404);
        assert_eq!(value["kind"], "ApiError");
        assert_eq!(value["message"], "HTTP Error 404");
        assert_eq!(value["durationMs"], 12);
        assert_eq!(value["retryCount"], 1);
        assert_eq!(value["requestPayload"]["input_text"], "x");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_error_record_ids_are_unique() {
        let a = ErrorRecord::new(
            "e",
            RequestPayload::new(),
            classify(&AttemptFailure::TimedOut),
            Duration::ZERO,
            0,
        );
        let b = ErrorRecord::new(
            "e",
            RequestPayload::new(),
            classify(&AttemptFailure::TimedOut),
            Duration::ZERO,
            0,
        );
        assert_ne!(a.id, b.id);
    }
}
