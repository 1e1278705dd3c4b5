//! Remote side of edgectl: the Functions REST API, streamed uploads, and the
//! job queue that runs per-function work concurrently.
//!
//! # Upload
//!
//! ```text
//! producer (blocking thread)                 consumer (request task)
//!   metadata ─┐                                │
//!   import map├─ multipart ─ mpsc channel ─────┴─ reqwest body ─▶ POST/PATCH
//!   sources   ┘        │
//!                      └─ on error: ctx.cancel_with_cause(e), abort body
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod multipart;
pub mod queue;
pub mod upload;

pub use api::{DeleteOutcome, FunctionStatus, FunctionsApi, RemoteFunction, UploadPayload};
pub use client::FunctionsClient;
pub use error::{ApiError, QueueError};
pub use queue::JobQueue;
