#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Per-region score accumulation and final totals.
pub mod aggregate;
/// Run configuration and recovery policies.
pub mod config;
/// Post record and coordinate types.
pub mod data;
/// Region grid construction and coordinate classification.
pub mod grid;
/// Sentiment lexicon loading and lookup.
pub mod lexicon;
/// Run reporting hooks.
pub mod observer;
/// Per-record token transform, classification, and scoring.
pub mod pipeline;
/// Run driver and worker pool.
pub mod runner;
/// Record stream traits and built-in sources.
pub mod source;
/// Shared type aliases.
pub mod types;

mod errors;

pub use aggregate::{AggregateResult, Aggregator};
pub use config::{RecordErrorPolicy, RunConfig};
pub use data::{Coordinate, Post};
pub use errors::PipelineError;
pub use grid::{Region, RegionGrid};
pub use lexicon::Lexicon;
pub use observer::{NoopObserver, RunObserver};
pub use pipeline::{
    MissingTokenPolicy, Outcome, PostPipeline, TokenFilter, TokenMapper, filters, mappers,
};
pub use runner::{RunReport, run};
pub use source::{BoundedSource, RecordStream, StreamingSource};
pub use types::{RegionId, Token, Weight};
