use std::sync::Arc;

use crate::observer::{NoopObserver, RunObserver};
use crate::pipeline::{MissingTokenPolicy, TokenFilter, TokenMapper};

/// Driver policy for a malformed record in the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordErrorPolicy {
    /// Count the record and keep draining the stream.
    #[default]
    Skip,
    /// Treat the first malformed record as fatal to the run.
    Abort,
}

/// Configuration for one aggregation run.
///
/// Mappers and filters are registered up front and treated as
/// immutable for the lifetime of the run; registration order is
/// execution order.
pub struct RunConfig {
    /// Ordered token mappers applied before filtering.
    pub mappers: Vec<TokenMapper>,
    /// Ordered token filters, ANDed.
    pub filters: Vec<TokenFilter>,
    /// Worker pool size; clamped to at least one worker.
    pub worker_count: usize,
    /// Recovery policy for malformed records.
    pub record_errors: RecordErrorPolicy,
    /// Policy for surviving tokens absent from the lexicon.
    pub missing_tokens: MissingTokenPolicy,
    /// Reporting capability invoked as records resolve.
    pub observer: Arc<dyn RunObserver>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mappers: Vec::new(),
            filters: Vec::new(),
            worker_count: 1,
            record_errors: RecordErrorPolicy::default(),
            missing_tokens: MissingTokenPolicy::default(),
            observer: Arc::new(NoopObserver),
        }
    }
}

impl RunConfig {
    /// Create a single-worker configuration with no mappers or filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token mapper. Registration order is execution order.
    pub fn with_mapper(mut self, mapper: TokenMapper) -> Self {
        self.mappers.push(mapper);
        self
    }

    /// Append a token filter. Registration order is execution order.
    pub fn with_filter(mut self, filter: TokenFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the worker pool size.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Override the malformed-record policy.
    pub fn with_record_error_policy(mut self, policy: RecordErrorPolicy) -> Self {
        self.record_errors = policy;
        self
    }

    /// Override the missing-token policy.
    pub fn with_missing_token_policy(mut self, policy: MissingTokenPolicy) -> Self {
        self.missing_tokens = policy;
        self
    }

    /// Attach a run observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }
}
