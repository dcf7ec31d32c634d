//! Per-algorithm and per-benchmark collections of traces
//!
//! ```text
//! BenchmarkResults (1) ──< AlgorithmResults (N, by name) ──< Trace (N, by seed)
//! ```
//!
//! Both levels expose the trace transform vocabulary and apply it to every
//! child, returning a new collection.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::executor::Executor;
use crate::load::{discover, discover_seeds, load_trace};
use crate::record::{Axis, EvaluationRecord};
use crate::table::{Series, Table};
use crate::trace::{sort_dedup, Trace};
use crate::{Error, Result};

/// Traces of one (benchmark, algorithm) pair, keyed by seed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResults {
    traces: BTreeMap<u32, Trace>,
}

impl AlgorithmResults {
    /// Create from a seed -> trace mapping.
    #[must_use]
    pub const fn new(traces: BTreeMap<u32, Trace>) -> Self {
        Self { traces }
    }

    /// Load every seed under `path` (`seed={s}` subdirectories), or only
    /// the given seeds.
    ///
    /// # Errors
    ///
    /// Returns the first load error of any seed.
    pub fn load(path: &Path, seeds: Option<&[u32]>) -> Result<Self> {
        let seeds = match seeds {
            Some(seeds) => seeds.to_vec(),
            None => discover_seeds(path)?,
        };
        let traces = seeds
            .into_iter()
            .map(|seed| Ok((seed, load_trace(&path.join(format!("seed={seed}")))?)))
            .collect::<Result<_>>()?;
        Ok(Self { traces })
    }

    /// Trace for `seed`.
    #[must_use]
    pub fn get(&self, seed: u32) -> Option<&Trace> {
        self.traces.get(&seed)
    }

    /// Seed -> trace mapping.
    #[must_use]
    pub const fn traces(&self) -> &BTreeMap<u32, Trace> {
        &self.traces
    }

    /// Number of seeds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// True if there are no seeds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Distinct seeds.
    #[must_use]
    pub fn seeds(&self) -> BTreeSet<u32> {
        self.traces.keys().copied().collect()
    }

    /// Sorted union of `axis` values across seeds.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if any record lacks the axis.
    pub fn indices(&self, axis: Axis) -> Result<Vec<f64>> {
        let mut xs = Vec::new();
        for trace in self.traces.values() {
            xs.extend(trace.indices(axis)?);
        }
        sort_dedup(&mut xs);
        Ok(xs)
    }

    /// All records of all seeds.
    pub fn iter_records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.traces.values().flat_map(Trace::iter)
    }

    /// Keep only `seeds` (all seeds when `None`).
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if a requested seed is absent.
    pub fn select(&self, seeds: Option<&[u32]>) -> Result<Self> {
        let Some(seeds) = seeds else {
            return Ok(self.clone());
        };
        let traces = seeds
            .iter()
            .map(|&seed| {
                self.traces
                    .get(&seed)
                    .map(|trace| (seed, trace.clone()))
                    .ok_or_else(|| Error::NotFound(format!("seed {seed}")))
            })
            .collect::<Result<_>>()?;
        Ok(Self { traces })
    }

    fn map_traces(&self, f: impl Fn(&Trace) -> Result<Trace>) -> Result<Self> {
        let traces = self
            .traces
            .iter()
            .map(|(&seed, trace)| Ok((seed, f(trace)?)))
            .collect::<Result<_>>()?;
        Ok(Self { traces })
    }

    /// See [`Trace::with_continuations`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-seed error.
    pub fn with_continuations(&self) -> Result<Self> {
        self.map_traces(Trace::with_continuations)
    }

    /// See [`Trace::with_cumulative_fidelity`]; ties collapse on loss.
    ///
    /// # Errors
    ///
    /// Propagates the first per-seed error.
    pub fn with_cumulative_fidelity(&self, n_workers: Option<usize>) -> Result<Self> {
        self.map_traces(|trace| {
            trace.with_cumulative_fidelity(n_workers, Axis::Loss)
        })
    }

    /// See [`Trace::incumbent_trace`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-seed error.
    pub fn incumbent_traces(&self, xaxis: Axis, yaxis: Axis) -> Result<Self> {
        self.map_traces(|trace| trace.incumbent_trace(xaxis, yaxis))
    }

    /// See [`Trace::rescale_xaxis`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-seed error.
    pub fn rescale_xaxis(&self, axis: Axis, factor: f64) -> Result<Self> {
        self.map_traces(|trace| trace.rescale_xaxis(axis, factor))
    }

    /// See [`Trace::in_range`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-seed error.
    pub fn in_range(&self, low: f64, high: f64, axis: Axis) -> Result<Self> {
        self.map_traces(|trace| trace.in_range(low, high, axis))
    }

    /// Table with one `seed-{s}` column per selected seed, aligned on `index`.
    ///
    /// Each column holds one value per distinct `index` value. Records sharing
    /// an index value collapse to the one latest in the trace (by end time),
    /// so over a raw trace `index` should be an axis with unique values such as
    /// `end_time`; incumbent traces are unique on their x-axis.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if a requested seed is absent
    /// - `Error::MissingAxis` if a record lacks either axis
    pub fn frame(&self, index: Axis, values: Axis, seeds: Option<&[u32]>) -> Result<Table> {
        let columns = self
            .select(seeds)?
            .traces
            .iter()
            .map(|(seed, trace)| Ok((format!("seed-{seed}"), trace.series(index, values)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table::align(columns, None))
    }
}

/// Algorithm collections of one benchmark, keyed by algorithm name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    algorithms: BTreeMap<String, AlgorithmResults>,
}

impl BenchmarkResults {
    /// Create from an algorithm -> results mapping.
    #[must_use]
    pub const fn new(algorithms: BTreeMap<String, AlgorithmResults>) -> Self {
        Self { algorithms }
    }

    /// Load `algorithm={a}` subdirectories of `path` (all of them when
    /// `algorithms` is `None`), one executor unit per algorithm.
    ///
    /// # Errors
    ///
    /// Returns the first load error of any algorithm.
    pub fn load<E: Executor>(
        path: &Path,
        algorithms: Option<&[String]>,
        seeds: Option<&[u32]>,
        executor: &E,
    ) -> Result<Self> {
        let names = match algorithms {
            Some(names) => names.to_vec(),
            None => discover(path, "algorithm")?,
        };
        let loaded = executor.execute(names, |name| -> Result<(String, AlgorithmResults)> {
            let results = AlgorithmResults::load(&path.join(format!("algorithm={name}")), seeds)?;
            Ok((name, results))
        });
        Ok(Self {
            algorithms: loaded.into_iter().collect::<Result<_>>()?,
        })
    }

    /// Results of one algorithm.
    #[must_use]
    pub fn get(&self, algorithm: &str) -> Option<&AlgorithmResults> {
        self.algorithms.get(algorithm)
    }

    /// Algorithm -> results mapping.
    #[must_use]
    pub const fn algorithms(&self) -> &BTreeMap<String, AlgorithmResults> {
        &self.algorithms
    }

    /// Algorithm names, sorted.
    pub fn algorithm_names(&self) -> impl Iterator<Item = &str> {
        self.algorithms.keys().map(String::as_str)
    }

    /// Number of algorithms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    /// True if there are no algorithms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    /// Union of seeds across algorithms.
    #[must_use]
    pub fn seeds(&self) -> BTreeSet<u32> {
        self.algorithms.values().flat_map(AlgorithmResults::seeds).collect()
    }

    /// Sorted union of `axis` values across algorithms.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if any record lacks the axis.
    pub fn indices(&self, axis: Axis) -> Result<Vec<f64>> {
        let mut xs = Vec::new();
        for algo in self.algorithms.values() {
            xs.extend(algo.indices(axis)?);
        }
        sort_dedup(&mut xs);
        Ok(xs)
    }

    /// All records of all algorithms and seeds.
    pub fn iter_records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.algorithms.values().flat_map(AlgorithmResults::iter_records)
    }

    /// Keep only `algorithms` (unknown names are ignored) and `seeds`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if a requested seed is absent.
    pub fn select(&self, algorithms: Option<&[String]>, seeds: Option<&[u32]>) -> Result<Self> {
        let algorithms = self
            .algorithms
            .iter()
            .filter(|(name, _)| algorithms.map_or(true, |keep| keep.contains(*name)))
            .map(|(name, results)| Ok((name.clone(), results.select(seeds)?)))
            .collect::<Result<_>>()?;
        Ok(Self { algorithms })
    }

    /// Apply `f` to every algorithm as one executor unit each.
    fn broadcast<E, F>(&self, executor: &E, f: F) -> Result<Self>
    where
        E: Executor,
        F: Fn(&AlgorithmResults) -> Result<AlgorithmResults> + Sync + Send,
    {
        let units: Vec<(&String, &AlgorithmResults)> = self.algorithms.iter().collect();
        let results = executor.execute(units, |(name, results)| -> Result<(String, AlgorithmResults)> {
            Ok((name.clone(), f(results)?))
        });
        Ok(Self {
            algorithms: results.into_iter().collect::<Result<_>>()?,
        })
    }

    /// See [`AlgorithmResults::with_continuations`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-algorithm error.
    pub fn with_continuations<E: Executor>(&self, executor: &E) -> Result<Self> {
        self.broadcast(executor, AlgorithmResults::with_continuations)
    }

    /// See [`AlgorithmResults::with_cumulative_fidelity`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-algorithm error.
    pub fn with_cumulative_fidelity<E: Executor>(
        &self,
        n_workers: Option<usize>,
        executor: &E,
    ) -> Result<Self> {
        self.broadcast(executor, |results| results.with_cumulative_fidelity(n_workers))
    }

    /// See [`AlgorithmResults::incumbent_traces`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-algorithm error.
    pub fn incumbent_traces<E: Executor>(&self, xaxis: Axis, yaxis: Axis, executor: &E) -> Result<Self> {
        self.broadcast(executor, |results| results.incumbent_traces(xaxis, yaxis))
    }

    /// See [`AlgorithmResults::rescale_xaxis`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-algorithm error.
    pub fn rescale_xaxis<E: Executor>(&self, axis: Axis, factor: f64, executor: &E) -> Result<Self> {
        self.broadcast(executor, |results| results.rescale_xaxis(axis, factor))
    }

    /// See [`AlgorithmResults::in_range`].
    ///
    /// # Errors
    ///
    /// Propagates the first per-algorithm error.
    pub fn in_range<E: Executor>(&self, low: f64, high: f64, axis: Axis, executor: &E) -> Result<Self> {
        self.broadcast(executor, |results| results.in_range(low, high, axis))
    }

    /// Rank algorithms against each other for one seed.
    ///
    /// Each algorithm's loss incumbent trace is projected onto
    /// `(xaxis, yaxis)`; the series are aligned on the union of their x
    /// values (plus `indices`, if given), forward-filled, and ranked per row
    /// with average tie-breaking (1 = best). An algorithm without `seed`
    /// contributes an all-missing column.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if a record lacks either axis.
    pub fn ranks(&self, xaxis: Axis, yaxis: Axis, seed: u32, indices: Option<&[f64]>) -> Result<Table> {
        let names: Vec<&str> = self.algorithm_names().collect();
        self.ranks_for(&names, xaxis, yaxis, seed, indices)
    }

    /// [`Self::ranks`] over a fixed column set; names without results here
    /// become all-missing columns.
    pub(crate) fn ranks_for(
        &self,
        algorithms: &[&str],
        xaxis: Axis,
        yaxis: Axis,
        seed: u32,
        indices: Option<&[f64]>,
    ) -> Result<Table> {
        let columns = algorithms
            .iter()
            .map(|&name| {
                let series = match self.get(name).and_then(|results| results.get(seed)) {
                    Some(trace) => trace.incumbent_trace(xaxis, Axis::Loss)?.series(xaxis, yaxis)?,
                    None => Series::default(),
                };
                Ok((name.to_string(), series))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(seed, algorithms = columns.len(), "ranking seed");
        Ok(Table::align(columns, indices).forward_fill().rank_rows())
    }
}
