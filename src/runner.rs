use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::aggregate::Aggregator;
use crate::config::{RecordErrorPolicy, RunConfig};
use crate::errors::PipelineError;
use crate::grid::RegionGrid;
use crate::lexicon::Lexicon;
use crate::pipeline::{Outcome, PostPipeline};
use crate::source::RecordStream;
use crate::types::{RegionId, Weight};

/// Outcome of a completed run.
///
/// Every recovered error class is reflected in a count; nothing is
/// swallowed silently.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Per-region sentiment totals, one entry per grid region in
    /// definition order.
    pub totals: IndexMap<RegionId, Weight>,
    /// Well-formed records that went through the pipeline, including
    /// those dropped as unclassified or counted as reduce errors.
    pub processed: u64,
    /// Records dropped because their coordinate matched no region.
    pub unclassified: u64,
    /// Malformed records skipped under `RecordErrorPolicy::Skip`.
    pub record_errors: u64,
    /// Records whose reduction hit a lexicon-missing token under the
    /// fail-loud policy.
    pub reduce_errors: u64,
}

/// Drain `stream` through a pool of `config.worker_count` workers and
/// return the per-region totals.
///
/// The stream is the single serialized resource: workers take turns
/// pulling the next record under a mutex, then transform and
/// accumulate fully in parallel against the shared read-only lexicon
/// and grid. A fatal error (malformed document structure, I/O failure,
/// or an aggregator contract violation) raises an abort flag;
/// in-flight workers finish their current record, stop pulling, and
/// the first fatal error is returned. The stream is dropped on every
/// exit path, which releases its underlying handle.
pub fn run<S: RecordStream>(
    stream: S,
    lexicon: Arc<Lexicon>,
    grid: Arc<RegionGrid>,
    config: RunConfig,
) -> Result<RunReport, PipelineError> {
    let RunConfig {
        mappers,
        filters,
        worker_count,
        record_errors: record_error_policy,
        missing_tokens,
        observer,
    } = config;

    let mut pipeline = PostPipeline::new(lexicon, Arc::clone(&grid))
        .with_missing_token_policy(missing_tokens);
    for mapper in mappers {
        pipeline = pipeline.with_mapper(mapper);
    }
    for filter in filters {
        pipeline = pipeline.with_filter(filter);
    }

    let worker_count = worker_count.max(1);
    debug!(
        worker_count,
        total_hint = stream.total(),
        regions = grid.len(),
        "starting aggregation run"
    );

    let aggregator = Aggregator::new(&grid);
    let stream = Mutex::new(stream);
    let abort = AtomicBool::new(false);
    let fatal: Mutex<Option<PipelineError>> = Mutex::new(None);
    let processed = AtomicU64::new(0);
    let record_errors = AtomicU64::new(0);
    let reduce_errors = AtomicU64::new(0);

    let raise_fatal = |err: PipelineError| {
        abort.store(true, Ordering::Relaxed);
        let mut slot = fatal.lock().expect("fatal slot poisoned");
        if slot.is_none() {
            *slot = Some(err);
        }
    };

    thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| {
                loop {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    // Pulling from the stream is the only operation
                    // that needs exclusion.
                    let item = stream
                        .lock()
                        .expect("record stream poisoned")
                        .next_record();
                    let Some(item) = item else { break };
                    match item {
                        Ok(post) => match pipeline.produce(&post) {
                            Ok(Outcome::Scored { region, score }) => {
                                processed.fetch_add(1, Ordering::Relaxed);
                                observer.post_scored(&region, score);
                                if let Err(err) = aggregator.accumulate(&region, score) {
                                    raise_fatal(err);
                                    break;
                                }
                            }
                            Ok(Outcome::Unclassified) => {
                                processed.fetch_add(1, Ordering::Relaxed);
                                aggregator.note_unclassified();
                                observer.post_unclassified();
                            }
                            Err(err @ PipelineError::MissingToken(_)) => {
                                processed.fetch_add(1, Ordering::Relaxed);
                                reduce_errors.fetch_add(1, Ordering::Relaxed);
                                warn!(%err, "record reduction failed");
                                observer.reduce_error(&err);
                            }
                            Err(err) => {
                                raise_fatal(err);
                                break;
                            }
                        },
                        Err(err @ PipelineError::Record(_)) => {
                            record_errors.fetch_add(1, Ordering::Relaxed);
                            warn!(%err, "skipping malformed record");
                            observer.record_error(&err);
                            if record_error_policy == RecordErrorPolicy::Abort {
                                raise_fatal(err);
                                break;
                            }
                        }
                        Err(err) => {
                            raise_fatal(err);
                            break;
                        }
                    }
                }
            });
        }
    });

    if let Some(err) = fatal.into_inner().expect("fatal slot poisoned") {
        return Err(err);
    }

    let snapshot = aggregator.snapshot();
    let processed = processed.into_inner();
    observer.stream_exhausted(processed);
    let report = RunReport {
        totals: snapshot.totals,
        processed,
        unclassified: snapshot.unclassified,
        record_errors: record_errors.into_inner(),
        reduce_errors: reduce_errors.into_inner(),
    };
    debug!(
        processed = report.processed,
        unclassified = report.unclassified,
        record_errors = report.record_errors,
        reduce_errors = report.reduce_errors,
        "aggregation run complete"
    );
    Ok(report)
}
