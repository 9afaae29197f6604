use crate::errors::PipelineError;
use crate::types::{RegionId, Weight};

/// Reporting capability handed to the run driver.
///
/// Hooks fire from worker threads as records resolve, so
/// implementations must be cheap and thread-safe. Every hook has an
/// empty default; implement only what you need. The runner also emits
/// `tracing` events independently of the observer.
pub trait RunObserver: Send + Sync {
    /// A record classified into `region` and contributed `score`.
    fn post_scored(&self, region: &RegionId, score: Weight) {
        let _ = (region, score);
    }

    /// A record's coordinate matched no region and was dropped.
    fn post_unclassified(&self) {}

    /// One record was malformed; the run may continue per policy.
    fn record_error(&self, error: &PipelineError) {
        let _ = error;
    }

    /// A surviving token was missing from the lexicon; that record's
    /// contribution was aborted and counted.
    fn reduce_error(&self, error: &PipelineError) {
        let _ = error;
    }

    /// The stream drained; `processed` well-formed records went
    /// through the pipeline.
    fn stream_exhausted(&self, processed: u64) {
        let _ = processed;
    }
}

/// Observer that ignores every event. The default for a run.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
