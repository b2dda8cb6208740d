//! Vidtrim - trim MP4 videos without re-encoding
//!
//! This library crate wraps `vidtrim-media` with request validation,
//! output naming, configuration and a background trim worker.

pub mod config;
pub mod error;
pub mod output;
pub mod probe;
pub mod request;
pub mod worker;

pub use error::{TrimError, TrimErrorKind};
pub use request::{TrimJob, TrimRequest};
pub use worker::{TrimOutcome, TrimResult, TrimWorker};
