use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::errors::PipelineError;
use crate::grid::RegionGrid;
use crate::types::{RegionId, Weight};

/// Final per-region sentiment totals.
///
/// Contains one entry for every region in the grid the aggregator was
/// built from, zero or not, in region definition order, and never a
/// region outside the grid. Unclassified records are exposed as a
/// count, not a sentinel region.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateResult {
    /// Region totals in definition order.
    pub totals: IndexMap<RegionId, Weight>,
    /// Records whose coordinate matched no region.
    pub unclassified: u64,
}

/// Shared accumulator of per-region sentiment totals.
///
/// The single mutable entity in a run. Contribution is an atomic add
/// per region, so any number of workers may accumulate concurrently
/// without lost updates; addition is commutative and associative, so
/// worker interleaving cannot change the final totals.
pub struct Aggregator {
    totals: IndexMap<RegionId, AtomicI64>,
    unclassified: AtomicU64,
}

impl Aggregator {
    /// Create an aggregator with every grid region present at zero.
    pub fn new(grid: &RegionGrid) -> Self {
        let totals = grid
            .regions()
            .iter()
            .map(|region| (region.id.clone(), AtomicI64::new(0)))
            .collect();
        Self {
            totals,
            unclassified: AtomicU64::new(0),
        }
    }

    /// Add `score` to the running total for `region`.
    ///
    /// A region the aggregator was not initialized with is a contract
    /// violation, never silently created.
    pub fn accumulate(&self, region: &str, score: Weight) -> Result<(), PipelineError> {
        let total = self
            .totals
            .get(region)
            .ok_or_else(|| PipelineError::UnknownRegion(region.to_string()))?;
        total.fetch_add(score, Ordering::Relaxed);
        Ok(())
    }

    /// Count one record whose coordinate matched no region.
    pub fn note_unclassified(&self) {
        self.unclassified.fetch_add(1, Ordering::Relaxed);
    }

    /// Read out the final totals.
    ///
    /// Valid once no more `accumulate` calls will occur; the run driver
    /// calls this after the worker pool has drained and joined.
    pub fn snapshot(&self) -> AggregateResult {
        AggregateResult {
            totals: self
                .totals
                .iter()
                .map(|(region, total)| (region.clone(), total.load(Ordering::SeqCst)))
                .collect(),
            unclassified: self.unclassified.load(Ordering::SeqCst),
        }
    }
}
