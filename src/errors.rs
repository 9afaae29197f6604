use std::io;

use thiserror::Error;

use crate::types::{RegionId, Token};

/// Error type for lexicon/grid construction, stream parsing, and
/// per-record processing failures.
///
/// `Format`, `Parse`, and `Io` are fatal to a run. `Record` and
/// `MissingToken` are local to one record; the driver counts them and
/// applies its configured recovery policy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A lexicon or grid input file violates its expected format.
    #[error("malformed {input}: {detail}")]
    Format {
        /// Which input was malformed, e.g. `"lexicon row"`.
        input: &'static str,
        /// What was wrong, including the offending line or feature.
        detail: String,
    },
    /// The post document's top-level structure could not be parsed.
    #[error("malformed post document: {0}")]
    Parse(String),
    /// A single record in an otherwise valid document is malformed.
    #[error("malformed record: {0}")]
    Record(String),
    /// A token reached the reducer without a lexicon entry.
    #[error("token '{0}' survived filtering but is absent from the lexicon")]
    MissingToken(Token),
    /// A score was contributed to a region the aggregator does not know.
    #[error("region '{0}' is not part of the grid this aggregator was built from")]
    UnknownRegion(RegionId),
    /// An underlying read failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Returns `true` for errors scoped to a single record, which the
    /// driver may recover from without aborting the run.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            PipelineError::Record(_) | PipelineError::MissingToken(_)
        )
    }
}
