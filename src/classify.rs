//! Failure classification.
//!
//! [`classify`] maps the raw outcome of a failed attempt ([`AttemptFailure`])
//! to an [`ErrorKind`] and a human-readable message. It is a pure function:
//! the same failure always classifies the same way.

use crate::types::GenerationResult;
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Fixed taxonomy of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The attempt exceeded its time budget.
    Timeout,
    /// Transport-level failure (DNS, refused connection, reset, ...).
    NetworkFailure,
    /// The remote answered with a bad status or an explicit `error` field.
    ApiError,
    /// A success response whose body is not a JSON object.
    ParseFailure,
    /// The caller's input was rejected before any network call.
    ValidationFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::NetworkFailure => "NetworkFailure",
            ErrorKind::ApiError => "ApiError",
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::ValidationFailure => "ValidationFailure",
        };
        f.write_str(s)
    }
}

/// Raw outcome of a failed attempt, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// Non-2xx response without an `error` field in its body.
    Status(u16),
    /// Response body carried a top-level `error` field.
    ErrorField { status: u16, message: String },
    /// A 2xx response whose body did not decode to a JSON object.
    Malformed { status: u16, detail: String },
    /// The timeout guard fired.
    TimedOut,
    /// Connectivity failure (DNS, connection refused).
    Connect { detail: Option<String> },
    /// Any other transport exception, with its message if it had one.
    Transport(Option<String>),
    /// Blank input, rejected before any network call.
    EmptyInput,
}

impl AttemptFailure {
    /// Translate an error raised by a [`Backend`](crate::backend::Backend).
    pub fn from_transport(err: &PipelineError) -> Self {
        match err {
            PipelineError::Request(e) if e.is_timeout() => AttemptFailure::TimedOut,
            PipelineError::Request(e) if e.is_connect() => AttemptFailure::Connect {
                detail: Some(e.to_string()),
            },
            PipelineError::Connect(detail) => AttemptFailure::Connect {
                detail: Some(detail.clone()),
            },
            PipelineError::Transport(message) => AttemptFailure::Transport(message.clone()),
            other => AttemptFailure::Transport(Some(other.to_string())),
        }
    }
}

/// Result of classifying an [`AttemptFailure`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status of the response, when there was one.
    pub status_code: Option<u16>,
    /// Extra context kept on the error record.
    pub details: Option<Value>,
}

/// Map a failed attempt to its kind and default message.
pub fn classify(failure: &AttemptFailure) -> Classification {
    let (kind, message, status_code, details) = match failure {
        AttemptFailure::Status(429) => (
            ErrorKind::ApiError,
            "Rate limit exceeded".to_string(),
            Some(429),
            None,
        ),
        AttemptFailure::Status(503) => (
            ErrorKind::ApiError,
            "Service temporarily unavailable".to_string(),
            Some(503),
            None,
        ),
        AttemptFailure::Status(504) => (
            ErrorKind::ApiError,
            "Gateway timeout".to_string(),
            Some(504),
            None,
        ),
        AttemptFailure::Status(status) => (
            ErrorKind::ApiError,
            format!("HTTP Error {}", status),
            Some(*status),
            None,
        ),
        AttemptFailure::ErrorField { status, message } => {
            (ErrorKind::ApiError, message.clone(), Some(*status), None)
        }
        AttemptFailure::Malformed { status, detail } => (
            ErrorKind::ParseFailure,
            "Malformed response body".to_string(),
            Some(*status),
            Some(json!({ "detail": detail })),
        ),
        AttemptFailure::TimedOut => (
            ErrorKind::Timeout,
            "Request timed out".to_string(),
            None,
            None,
        ),
        AttemptFailure::Connect { detail } => (
            ErrorKind::NetworkFailure,
            "Network connection failed".to_string(),
            None,
            detail.as_ref().map(|d| json!({ "detail": d })),
        ),
        AttemptFailure::Transport(message) => (
            ErrorKind::NetworkFailure,
            message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or("Unknown error occurred")
                .to_string(),
            None,
            None,
        ),
        AttemptFailure::EmptyInput => (
            ErrorKind::ValidationFailure,
            "Empty input text".to_string(),
            None,
            None,
        ),
    };

    Classification {
        kind,
        message,
        status_code,
        details,
    }
}

/// Inspect a completed HTTP exchange.
///
/// A top-level `error` field wins over the status code. Otherwise non-2xx is
/// a status failure, and a 2xx body must decode to a JSON object.
pub fn inspect_response(
    status: u16,
    body: &str,
) -> std::result::Result<GenerationResult, AttemptFailure> {
    let decoded: Option<Value> = serde_json::from_str(body).ok();

    if let Some(error) = decoded.as_ref().and_then(|v| v.get("error")) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(AttemptFailure::ErrorField { status, message });
    }

    if !(200..300).contains(&status) {
        return Err(AttemptFailure::Status(status));
    }

    match decoded {
        Some(Value::Object(fields)) => Ok(GenerationResult::from_map(fields)),
        Some(other) => Err(AttemptFailure::Malformed {
            status,
            detail: format!("expected a JSON object, got {}", json_type(&other)),
        }),
        None => Err(AttemptFailure::Malformed {
            status,
            detail: "body is not valid JSON".to_string(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
