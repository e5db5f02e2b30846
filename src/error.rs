use crate::types::ErrorRecord;
use thiserror::Error;

/// Errors produced by the pipeline and its components.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure raised by `reqwest`.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed (durable error log, config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote host could not be reached (DNS failure, connection refused).
    ///
    /// Backends that do not go through `reqwest` (e.g. the mock backend)
    /// report connectivity problems with this variant.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// Any other transport exception. `None` when the transport gave no message.
    #[error("Transport failure: {}", .0.as_deref().unwrap_or("unknown"))]
    Transport(Option<String>),

    /// A logical generation operation ended in failure.
    ///
    /// Carries the final [`ErrorRecord`]; displays the classified message.
    #[error("{}", .0.message)]
    Generation(Box<ErrorRecord>),

    /// A newer submission replaced the operation before it finished.
    #[error("Submission {submission} was superseded by a newer one")]
    Superseded { submission: u64 },

    /// Invalid configuration detected at build or load time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// The final error record, if this is a failed generation.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            PipelineError::Generation(record) => Some(record),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

#[cfg(feature = "yaml")]
impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
