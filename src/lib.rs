//! # Content Gen Pipeline
//!
//! Resilient remote calls for social post generation.
//!
//! The crate posts a content idea to a remote generation service and turns
//! whatever comes back (a result, a bad status, an `error` body, a dropped
//! connection, a hung request) into either a [`GenerationResult`] or a
//! classified [`ErrorRecord`]. Transient failures are retried with
//! exponential backoff, every attempt is bounded by a timeout, and every
//! step lands in a structured, time-ordered session log.
//!
//! ## Core Concepts
//!
//! - **[`ExecCtx`]** — shared execution context (HTTP client, backend, base
//!   URL, retry policy, timeout, error store, optional event handler).
//! - **[`Session`] / [`Operation`]** — one operation per user submission.
//!   Starting a new submission clears the live log and supersedes older ones.
//! - **[`GenerateCall`]** — the request orchestrator: validate, attempt under
//!   a [`TimeoutGuard`], [`classify`](classify::classify) failures, retry per
//!   [`RetryPolicy`].
//! - **[`PostChain`]** — text generation for a [`Platform`] followed by the
//!   chained image generation.
//! - **[`ErrorStore`]** — durable, bounded log of every failed attempt.
//!
//! ## Quick Start
//!
//! ```no_run
//! use content_gen_pipeline::{ExecCtx, Platform, PostChain, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ExecCtx::builder("http://localhost:5000").build();
//!     let session = Session::new();
//!
//!     let post = PostChain::new(Platform::LinkedIn)
//!         .execute(&ctx, &session, "Why layer-2 rollups matter")
//!         .await?;
//!     println!("{}", post.text.unwrap_or_default());
//!
//!     for entry in session.log().entries() {
//!         println!("[{}] {} {}", entry.timestamp, entry.level, entry.message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod chain;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod generate_call;
pub mod logger;
pub mod operation;
pub mod platform;
pub mod retry;
pub mod store;
pub mod timeout;
pub mod types;

pub use backend::{Backend, BackendResponse, HttpBackend, MockBackend, MockStep};
pub use chain::{ChainedImage, PostChain, PostOutcome};
pub use classify::{AttemptFailure, Classification, ErrorKind};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use generate_call::GenerateCall;
pub use logger::{LogEntry, LogLevel, SessionLog, StructuredLogger};
pub use operation::{Operation, OperationState, Session};
pub use platform::{Endpoint, Platform};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::{ErrorStore, JsonFileErrorStore, MemoryErrorStore};
pub use timeout::TimeoutGuard;
pub use types::{ErrorRecord, GenerationResult, RequestPayload};
