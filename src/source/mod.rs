//! Post record streams.
//!
//! Ownership model:
//! - `RecordStream` is the driver-facing interface: a lazy, finite,
//!   forward-only sequence of posts. Streams are single-pass and not
//!   restartable.
//! - `BoundedSource` materializes the whole document and knows the
//!   record count before iteration starts.
//! - `StreamingSource` reads the document incrementally so peak memory
//!   stays proportional to one record, however many records follow.
//!
//! Both modes yield the same posts in the same order for the same
//! logical document. A stream owns its underlying reader; dropping the
//! stream releases the handle on every exit path, including early
//! abandonment by the driver.

use crate::data::Post;
use crate::errors::PipelineError;

/// Bounded source over an in-memory document.
pub mod bounded;
/// Incremental source with bounded peak memory.
pub mod streaming;

pub use bounded::BoundedSource;
pub use streaming::StreamingSource;

/// Driver-facing record stream interface.
///
/// Error semantics follow the record/document split: a malformed
/// individual record surfaces as `Some(Err(PipelineError::Record))` and
/// the stream keeps going, so the driver chooses between skipping and
/// aborting. Malformed document structure or an I/O failure is fatal:
/// the stream reports it once and then ends.
pub trait RecordStream: Send {
    /// Exact record count when known before iteration (bounded mode).
    /// Streaming sources return `None` until exhaustion.
    fn total(&self) -> Option<usize>;

    /// Pull the next record. `None` means the stream is exhausted.
    fn next_record(&mut self) -> Option<Result<Post, PipelineError>>;
}
