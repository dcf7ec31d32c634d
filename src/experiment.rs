//! Experiment - benchmark collections plus benchmark metadata
//!
//! ```text
//! ExperimentResults ──< BenchmarkResults (by benchmark) ──< AlgorithmResults ──< Trace
//!        │
//!        └──< Benchmark metadata (by benchmark, same keys)
//! ```
//!
//! Transforms are dispatched as one executor unit per (benchmark, algorithm)
//! pair; the units touch disjoint data, so results are independent of
//! scheduling order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::benchmark::Benchmark;
use crate::collection::{AlgorithmResults, BenchmarkResults};
use crate::executor::Executor;
use crate::load::{algorithm_dir, discover, discover_seeds, load_trace, seed_dir};
use crate::record::{Axis, EvaluationRecord};
use crate::table::Table;
use crate::trace::{sort_dedup, Trace};
use crate::{Error, Result};

/// How to derive the x-axis rescaling factor of a benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescaleBy {
    /// Divide by the benchmark's maximum fidelity.
    MaxFidelity,
}

/// Mean rank and its standard error, per axis value and algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct RankSummary {
    /// Element-wise mean over all (benchmark, seed) rank tables.
    pub means: Table,
    /// Standard error of the mean over the same tables.
    pub standard_errors: Table,
}

/// All results of one experiment group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    name: String,
    benchmarks: BTreeMap<String, BenchmarkResults>,
    benchmark_configs: BTreeMap<String, Benchmark>,
}

/// Input of [`ExperimentResults::load`].
#[derive(Debug, Clone)]
pub struct LoadRequest<'a> {
    /// Experiment group name.
    pub name: &'a str,
    /// Directory holding `benchmark={b}` subdirectories.
    pub results_dir: &'a Path,
    /// Directory holding `{benchmark}.yaml` metadata.
    pub benchmark_config_dir: &'a Path,
    /// Benchmarks to load; discovered when empty.
    pub benchmarks: &'a [String],
    /// Algorithms to load; discovered per benchmark when empty.
    pub algorithms: &'a [String],
    /// Seeds to load; discovered per algorithm when `None`.
    pub seeds: Option<&'a [u32]>,
}

type Triple = (String, String, u32);

impl ExperimentResults {
    /// Create an experiment from results and metadata with identical keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the benchmark key sets differ.
    pub fn new(
        name: impl Into<String>,
        benchmarks: BTreeMap<String, BenchmarkResults>,
        benchmark_configs: BTreeMap<String, Benchmark>,
    ) -> Result<Self> {
        if !benchmarks.keys().eq(benchmark_configs.keys()) {
            return Err(Error::InvalidInput(
                "benchmark results and metadata must cover the same benchmarks".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            benchmarks,
            benchmark_configs,
        })
    }

    /// Read every (benchmark, algorithm, seed) trace, one executor unit per
    /// trace, and the metadata of every benchmark.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable trace or metadata file; no partial
    /// experiment is returned.
    pub fn load<E: Executor>(request: &LoadRequest<'_>, executor: &E) -> Result<Self> {
        let results_dir = request.results_dir;
        let benchmarks = if request.benchmarks.is_empty() {
            discover(results_dir, "benchmark")?
        } else {
            request.benchmarks.to_vec()
        };

        let mut triples: Vec<Triple> = Vec::new();
        for benchmark in &benchmarks {
            let algorithms = if request.algorithms.is_empty() {
                discover(&results_dir.join(format!("benchmark={benchmark}")), "algorithm")?
            } else {
                request.algorithms.to_vec()
            };
            for algorithm in algorithms {
                let seeds = match request.seeds {
                    Some(seeds) => seeds.to_vec(),
                    None => discover_seeds(&algorithm_dir(results_dir, benchmark, &algorithm))?,
                };
                triples.extend(seeds.into_iter().map(|s| (benchmark.clone(), algorithm.clone(), s)));
            }
        }
        info!(
            experiment = request.name,
            benchmarks = benchmarks.len(),
            traces = triples.len(),
            "loading experiment"
        );

        let loaded = executor.execute(triples, |(benchmark, algorithm, seed)| -> Result<(Triple, Trace)> {
            let trace = load_trace(&seed_dir(results_dir, &benchmark, &algorithm, seed))?;
            Ok(((benchmark, algorithm, seed), trace))
        });

        let mut nested: BTreeMap<String, BTreeMap<String, BTreeMap<u32, Trace>>> = benchmarks
            .iter()
            .map(|b| (b.clone(), BTreeMap::new()))
            .collect();
        for item in loaded {
            let ((benchmark, algorithm, seed), trace) = item?;
            nested
                .entry(benchmark)
                .or_default()
                .entry(algorithm)
                .or_default()
                .insert(seed, trace);
        }

        let results = nested
            .into_iter()
            .map(|(benchmark, algorithms)| {
                let algorithms = algorithms
                    .into_iter()
                    .map(|(name, traces)| (name, AlgorithmResults::new(traces)))
                    .collect();
                (benchmark, BenchmarkResults::new(algorithms))
            })
            .collect();
        let configs = benchmarks
            .iter()
            .map(|b| Ok((b.clone(), Benchmark::from_name(b, request.benchmark_config_dir)?)))
            .collect::<Result<_>>()?;

        Self::new(request.name, results, configs)
    }

    /// Experiment group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Results of one benchmark.
    #[must_use]
    pub fn get(&self, benchmark: &str) -> Option<&BenchmarkResults> {
        self.benchmarks.get(benchmark)
    }

    /// Benchmark -> results mapping.
    #[must_use]
    pub const fn benchmarks(&self) -> &BTreeMap<String, BenchmarkResults> {
        &self.benchmarks
    }

    /// Benchmark -> metadata mapping.
    #[must_use]
    pub const fn benchmark_configs(&self) -> &BTreeMap<String, Benchmark> {
        &self.benchmark_configs
    }

    /// Union of algorithm names across benchmarks, sorted.
    #[must_use]
    pub fn algorithms(&self) -> Vec<String> {
        self.benchmarks
            .values()
            .flat_map(|b| b.algorithm_names().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Union of seeds across benchmarks.
    #[must_use]
    pub fn seeds(&self) -> BTreeSet<u32> {
        self.benchmarks.values().flat_map(BenchmarkResults::seeds).collect()
    }

    /// Sorted union of `axis` values across the whole experiment.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if any record lacks the axis.
    pub fn indices(&self, axis: Axis) -> Result<Vec<f64>> {
        let mut xs = Vec::new();
        for bench in self.benchmarks.values() {
            xs.extend(bench.indices(axis)?);
        }
        sort_dedup(&mut xs);
        Ok(xs)
    }

    /// All records of the experiment.
    pub fn iter_records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.benchmarks.values().flat_map(BenchmarkResults::iter_records)
    }

    /// Restrict to a subset of benchmarks, algorithms and seeds. `None`
    /// keeps everything at that level; unknown benchmark or algorithm names
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if a requested seed is absent.
    pub fn select(
        &self,
        benchmarks: Option<&[String]>,
        algorithms: Option<&[String]>,
        seeds: Option<&[u32]>,
    ) -> Result<Self> {
        let keep = |name: &String| benchmarks.map_or(true, |names| names.contains(name));
        let results = self
            .benchmarks
            .iter()
            .filter(|(name, _)| keep(*name))
            .map(|(name, bench)| Ok((name.clone(), bench.select(algorithms, seeds)?)))
            .collect::<Result<_>>()?;
        let configs = self
            .benchmark_configs
            .iter()
            .filter(|(name, _)| keep(*name))
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect();
        Self::new(self.name.clone(), results, configs)
    }

    /// Apply `f` to every (benchmark, algorithm) pair as one executor unit.
    fn broadcast<E, F>(&self, executor: &E, f: F) -> Result<Self>
    where
        E: Executor,
        F: Fn(&str, &AlgorithmResults) -> Result<AlgorithmResults> + Sync + Send,
    {
        let units: Vec<(&String, &String, &AlgorithmResults)> = self
            .benchmarks
            .iter()
            .flat_map(|(bench, results)| {
                results
                    .algorithms()
                    .iter()
                    .map(move |(algo, algo_results)| (bench, algo, algo_results))
            })
            .collect();

        let done = executor.execute(
            units,
            |(bench, algo, results)| -> Result<(String, String, AlgorithmResults)> {
                debug!(benchmark = %bench, algorithm = %algo, "transforming");
                Ok((bench.clone(), algo.clone(), f(bench, results)?))
            },
        );

        let mut nested: BTreeMap<String, BTreeMap<String, AlgorithmResults>> = self
            .benchmarks
            .keys()
            .map(|b| (b.clone(), BTreeMap::new()))
            .collect();
        for item in done {
            let (bench, algo, results) = item?;
            nested.entry(bench).or_default().insert(algo, results);
        }

        Ok(Self {
            name: self.name.clone(),
            benchmarks: nested
                .into_iter()
                .map(|(bench, algos)| (bench, BenchmarkResults::new(algos)))
                .collect(),
            benchmark_configs: self.benchmark_configs.clone(),
        })
    }

    /// See [`Trace::with_continuations`].
    ///
    /// # Errors
    ///
    /// Propagates the first error of any unit.
    pub fn with_continuations<E: Executor>(&self, executor: &E) -> Result<Self> {
        self.broadcast(executor, |_, results| results.with_continuations())
    }

    /// See [`Trace::with_cumulative_fidelity`]; `n_workers` is the number
    /// of optimizer workers that produced each trace.
    ///
    /// # Errors
    ///
    /// Propagates the first error of any unit.
    pub fn with_cumulative_fidelity<E: Executor>(
        &self,
        n_workers: Option<usize>,
        executor: &E,
    ) -> Result<Self> {
        self.broadcast(executor, |_, results| results.with_cumulative_fidelity(n_workers))
    }

    /// See [`Trace::incumbent_trace`].
    ///
    /// # Errors
    ///
    /// Propagates the first error of any unit.
    pub fn incumbent_traces<E: Executor>(&self, xaxis: Axis, yaxis: Axis, executor: &E) -> Result<Self> {
        self.broadcast(executor, |_, results| results.incumbent_traces(xaxis, yaxis))
    }

    /// Rescale `axis` of every benchmark by a factor derived from its
    /// metadata (`1 / max_fidelity`).
    ///
    /// # Errors
    ///
    /// Propagates the first error of any unit.
    pub fn rescale_xaxis<E: Executor>(&self, axis: Axis, by: RescaleBy, executor: &E) -> Result<Self> {
        let factors: BTreeMap<&str, f64> = self
            .benchmark_configs
            .iter()
            .map(|(name, config)| {
                let factor = match by {
                    RescaleBy::MaxFidelity => 1.0 / config.max_fidelity(),
                };
                (name.as_str(), factor)
            })
            .collect();

        self.broadcast(executor, |bench, results| {
            let factor = factors
                .get(bench)
                .ok_or_else(|| Error::NotFound(format!("metadata for benchmark {bench}")))?;
            results.rescale_xaxis(axis, *factor)
        })
    }

    /// See [`Trace::in_range`].
    ///
    /// # Errors
    ///
    /// Propagates the first error of any unit.
    pub fn in_range<E: Executor>(&self, low: f64, high: f64, axis: Axis, executor: &E) -> Result<Self> {
        self.broadcast(executor, |_, results| results.in_range(low, high, axis))
    }

    /// Aggregate per-seed rank tables over every (benchmark, seed) pair.
    ///
    /// All tables share the experiment-wide axis universe and algorithm set;
    /// `means` is their element-wise mean and `standard_errors` the standard
    /// error of the mean for each algorithm at each axis value.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if a benchmark lacks a seed another benchmark has
    /// - `Error::MissingAxis` if a record lacks either axis
    /// - `Error::InvalidInput` if the experiment holds no (benchmark, seed) pair
    pub fn ranks<E: Executor>(&self, xaxis: Axis, yaxis: Axis, executor: &E) -> Result<RankSummary> {
        let indices = self.indices(xaxis)?;
        let algorithms = self.algorithms();
        let names: Vec<&str> = algorithms.iter().map(String::as_str).collect();
        let seeds = self.seeds();

        // Every benchmark must cover every ranked seed
        for (name, bench) in &self.benchmarks {
            let covered = bench.seeds();
            if let Some(seed) = seeds.iter().find(|seed| !covered.contains(*seed)) {
                return Err(Error::NotFound(format!(
                    "benchmark `{name}` has no seed {seed} (seeds {seeds:?} are ranked together)"
                )));
            }
        }

        let pairs: Vec<(&BenchmarkResults, u32)> = self
            .benchmarks
            .values()
            .flat_map(|bench| seeds.iter().map(move |&seed| (bench, seed)))
            .collect();
        info!(pairs = pairs.len(), algorithms = names.len(), "aggregating ranks");

        let tables = executor
            .execute(pairs, |(bench, seed)| {
                bench.ranks_for(&names, xaxis, yaxis, seed, Some(&indices))
            })
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        Ok(RankSummary {
            means: Table::mean_of(&tables)?,
            standard_errors: Table::standard_error_of(&tables)?,
        })
    }
}
