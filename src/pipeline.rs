//! Fetch pipeline - load, transform and cache an experiment group
//!
//! ```text
//! cache? ──hit──> ExperimentResults
//!   │ miss
//!   v
//! load ─> continuations ─> cumulative fidelity ─> incumbents ─> rescale ─> (cache)
//! ```
//!
//! Each stage is optional and runs inside its own `tracing` span.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::executor::{Executor, Sequential};
use crate::experiment::{ExperimentResults, LoadRequest, RescaleBy};
use crate::record::Axis;
use crate::{Error, Result};

/// File name of the results cache inside `{base}/results/{group}/`.
pub const CACHE_FILE: &str = ".results_cache.json";

/// Settings of one [`fetch_results`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Experiment group, the directory name under `{base}/results/`.
    pub experiment_group: String,
    /// Project root.
    pub base_path: PathBuf,
    /// Benchmarks to load; empty discovers them.
    pub benchmarks: Vec<String>,
    /// Algorithms to load; empty discovers them.
    pub algorithms: Vec<String>,
    /// Seeds to load; `None` discovers them per algorithm.
    pub seeds: Option<Vec<u32>>,
    /// Benchmark metadata directory; `{base}/configs/benchmark` when `None`.
    pub benchmark_config_dir: Option<PathBuf>,
    /// Number of optimizer workers that produced each trace.
    pub n_workers: Option<usize>,
    /// Spread loading and transforms over a thread pool.
    pub parallel: bool,
    /// Pool size; rayon's default when `None`.
    pub threads: Option<usize>,
    /// Stitch continued evaluations.
    pub continuations: bool,
    /// Compute cumulated fidelity.
    pub cumulate_fidelities: bool,
    /// Rescale the x-axis per benchmark.
    pub rescale: Option<RescaleBy>,
    /// Reduce traces to their incumbents.
    pub incumbents_only: bool,
    /// Metric the incumbent is chosen on.
    pub incumbent_value: Axis,
    /// Axis the incumbent trace and rescaling operate on.
    pub xaxis: Axis,
    /// Return the cached experiment if one exists.
    pub use_cache: bool,
    /// Write the result to the cache.
    pub collect: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            experiment_group: String::new(),
            base_path: PathBuf::from("."),
            benchmarks: Vec::new(),
            algorithms: Vec::new(),
            seeds: None,
            benchmark_config_dir: None,
            n_workers: Some(1),
            parallel: true,
            threads: None,
            continuations: true,
            cumulate_fidelities: true,
            rescale: Some(RescaleBy::MaxFidelity),
            incumbents_only: true,
            incumbent_value: Axis::Loss,
            xaxis: Axis::CumulatedFidelity,
            use_cache: false,
            collect: false,
        }
    }
}

impl FetchConfig {
    /// Create a builder for `experiment_group` under `base_path`.
    #[must_use]
    pub fn builder(experiment_group: impl Into<String>, base_path: impl Into<PathBuf>) -> FetchConfigBuilder {
        FetchConfigBuilder::new(experiment_group, base_path)
    }

    /// Load a config from a YAML file; absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Yaml` if the file is unreadable.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    /// `{base}/results/{group}`
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.base_path.join("results").join(&self.experiment_group)
    }

    /// Metadata directory actually used.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.benchmark_config_dir
            .clone()
            .unwrap_or_else(|| self.base_path.join("configs").join("benchmark"))
    }

    /// `{base}/results/{group}/.results_cache.json`
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.results_dir().join(CACHE_FILE)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.xaxis, Axis::CumulatedFidelity | Axis::EndTimeSinceGlobalStart) {
            return Err(Error::Unsupported(format!(
                "x-axis `{}`, expected cumulated_fidelity or end_time_since_global_start",
                self.xaxis
            )));
        }
        if self.incumbent_value != Axis::Loss {
            return Err(Error::Unsupported(format!(
                "incumbent value `{}`, only loss is supported",
                self.incumbent_value
            )));
        }
        Ok(())
    }
}

/// Builder for [`FetchConfig`].
#[derive(Debug, Clone)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new(experiment_group: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            config: FetchConfig {
                experiment_group: experiment_group.into(),
                base_path: base_path.into(),
                ..FetchConfig::default()
            },
        }
    }

    /// Restrict to these benchmarks.
    #[must_use]
    pub fn benchmarks<S: Into<String>>(mut self, benchmarks: impl IntoIterator<Item = S>) -> Self {
        self.config.benchmarks = benchmarks.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to these algorithms.
    #[must_use]
    pub fn algorithms<S: Into<String>>(mut self, algorithms: impl IntoIterator<Item = S>) -> Self {
        self.config.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to these seeds.
    #[must_use]
    pub fn seeds(mut self, seeds: impl IntoIterator<Item = u32>) -> Self {
        self.config.seeds = Some(seeds.into_iter().collect());
        self
    }

    /// Read benchmark metadata from `dir`.
    #[must_use]
    pub fn benchmark_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.benchmark_config_dir = Some(dir.into());
        self
    }

    /// Number of optimizer workers per trace.
    #[must_use]
    pub const fn n_workers(mut self, n_workers: usize) -> Self {
        self.config.n_workers = Some(n_workers);
        self
    }

    /// Run on a thread pool of `threads` workers (`None`: rayon's default),
    /// or sequentially when `parallel` is false.
    #[must_use]
    pub const fn parallel(mut self, parallel: bool, threads: Option<usize>) -> Self {
        self.config.parallel = parallel;
        self.config.threads = threads;
        self
    }

    /// Toggle continuation stitching.
    #[must_use]
    pub const fn continuations(mut self, on: bool) -> Self {
        self.config.continuations = on;
        self
    }

    /// Toggle cumulative fidelity.
    #[must_use]
    pub const fn cumulate_fidelities(mut self, on: bool) -> Self {
        self.config.cumulate_fidelities = on;
        self
    }

    /// Set or disable x-axis rescaling.
    #[must_use]
    pub const fn rescale(mut self, rescale: Option<RescaleBy>) -> Self {
        self.config.rescale = rescale;
        self
    }

    /// Toggle incumbent reduction.
    #[must_use]
    pub const fn incumbents_only(mut self, on: bool) -> Self {
        self.config.incumbents_only = on;
        self
    }

    /// Metric the incumbent is chosen on.
    #[must_use]
    pub const fn incumbent_value(mut self, axis: Axis) -> Self {
        self.config.incumbent_value = axis;
        self
    }

    /// x-axis of the incumbent traces.
    #[must_use]
    pub const fn xaxis(mut self, axis: Axis) -> Self {
        self.config.xaxis = axis;
        self
    }

    /// Read from the cache when present.
    #[must_use]
    pub const fn use_cache(mut self, on: bool) -> Self {
        self.config.use_cache = on;
        self
    }

    /// Write the result to the cache.
    #[must_use]
    pub const fn collect(mut self, on: bool) -> Self {
        self.config.collect = on;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> FetchConfig {
        self.config
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    created_at: DateTime<Utc>,
    experiment: ExperimentResults,
}

/// Load and transform an experiment group as configured.
///
/// # Errors
///
/// - `Error::Unsupported` for an unsupported x-axis or incumbent metric
/// - any load or transform error; a failed stage aborts the whole fetch
pub fn fetch_results(config: &FetchConfig) -> Result<ExperimentResults> {
    config.validate()?;

    let cache = config.cache_path();
    if config.use_cache && cache.is_file() {
        match read_cache(&cache) {
            Ok(envelope) => {
                info!(
                    path = %cache.display(),
                    created_at = %envelope.created_at,
                    "using cached results"
                );
                return Ok(envelope.experiment);
            }
            Err(e) => warn!(path = %cache.display(), error = %e, "unreadable cache, rebuilding"),
        }
    }

    #[cfg(feature = "rayon")]
    if config.parallel {
        let pool = crate::executor::RayonPool::new(config.threads)?;
        info!(threads = pool.threads(), "fetching in parallel");
        return run(config, &pool);
    }
    run(config, &Sequential)
}

fn run<E: Executor>(config: &FetchConfig, executor: &E) -> Result<ExperimentResults> {
    let results_dir = config.results_dir();
    let config_dir = config.config_dir();

    let mut experiment = {
        let _span = info_span!("load", group = %config.experiment_group).entered();
        ExperimentResults::load(
            &LoadRequest {
                name: &config.experiment_group,
                results_dir: &results_dir,
                benchmark_config_dir: &config_dir,
                benchmarks: &config.benchmarks,
                algorithms: &config.algorithms,
                seeds: config.seeds.as_deref(),
            },
            executor,
        )?
    };

    if config.continuations {
        let _span = info_span!("continuations").entered();
        experiment = experiment.with_continuations(executor)?;
    }

    if config.cumulate_fidelities {
        let _span = info_span!("cumulative_fidelity", n_workers = ?config.n_workers).entered();
        experiment = experiment.with_cumulative_fidelity(config.n_workers, executor)?;
    }

    if config.incumbents_only {
        let _span = info_span!("incumbents", xaxis = %config.xaxis).entered();
        experiment = experiment.incumbent_traces(config.xaxis, config.incumbent_value, executor)?;
    }

    if let Some(by) = config.rescale {
        let _span = info_span!("rescale", ?by).entered();
        experiment = experiment.rescale_xaxis(config.xaxis, by, executor)?;
    }

    if config.collect {
        write_cache(&config.cache_path(), &experiment)?;
    }

    info!(
        group = %config.experiment_group,
        benchmarks = experiment.benchmarks().len(),
        records = experiment.iter_records().count(),
        "fetched results"
    );
    Ok(experiment)
}

fn read_cache(path: &Path) -> Result<CacheEnvelope> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_cache(path: &Path, experiment: &ExperimentResults) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let envelope = CacheEnvelope {
        created_at: Utc::now(),
        experiment: experiment.clone(),
    };
    serde_json::to_writer(BufWriter::new(File::create(path)?), &envelope)?;
    info!(path = %path.display(), "wrote results cache");
    Ok(())
}
