//! # hpo-traces: Multi-Fidelity HPO Results Aggregation
//!
//! **Version**: 0.2.3
//!
//! hpo-traces loads the evaluation logs of hyperparameter-optimization runs,
//! normalizes them into time-ordered traces, and aggregates them into
//! per-algorithm rank curves with uncertainty.
//!
//! ```text
//! ExperimentResults ──< BenchmarkResults ──< AlgorithmResults ──< Trace ──< EvaluationRecord
//!   (by benchmark)        (by algorithm)        (by seed)
//! ```
//!
//! ## Transforms
//!
//! - **Continuations**: link an evaluation to the lower-bracket evaluation of
//!   the same configuration and keep only the incremental fidelity and cost
//! - **Cumulative fidelity**: running total of consumed budget, per worker
//!   and merged
//! - **Incumbents**: best-so-far loss curve
//! - **Rescaling**: x-axis in units of a benchmark's maximum fidelity
//! - **Ranking**: per-seed average ranks, then mean and standard error over
//!   every (benchmark, seed) pair
//!
//! Every transform returns a new value; inputs are never mutated.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hpo_traces::executor::Sequential;
//! use hpo_traces::pipeline::{fetch_results, FetchConfig};
//! use hpo_traces::Axis;
//!
//! let config = FetchConfig::builder("mf-prior", "/data/experiments")
//!     .benchmarks(["lcbench-189862"])
//!     .seeds(0..10)
//!     .build();
//! let experiment = fetch_results(&config)?;
//!
//! let ranks = experiment.ranks(Axis::CumulatedFidelity, Axis::Loss, &Sequential)?;
//! for (x, row) in ranks.means.index().iter().zip(ranks.means.rows()) {
//!     println!("{x}: {row:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod benchmark;
pub mod collection;
pub mod error;
pub mod executor;
pub mod experiment;
pub mod load;
pub mod pipeline;
pub mod record;
pub mod storage;
pub mod table;
pub mod trace;

pub use benchmark::Benchmark;
pub use collection::{AlgorithmResults, BenchmarkResults};
pub use error::{Error, Result};
pub use experiment::{ExperimentResults, RankSummary, RescaleBy};
pub use record::{Axis, EvaluationRecord, EvaluationRecordBuilder, RecordKey};
pub use table::{Series, Table};
pub use trace::Trace;
