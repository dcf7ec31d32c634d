//! Benchmark metadata read from `{config_dir}/{name}.yaml`

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Static metadata of one benchmark.
///
/// Only `max_fidelity` feeds the transforms (axis rescaling); the reference
/// errors are carried for downstream reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    name: String,
    basename: String,
    prior: Option<String>,
    task_id: Option<String>,
    epsilon: Option<f64>,
    optimum: Option<f64>,
    prior_error: Option<f64>,
    best_errors: BestErrors,
    max_fidelity: f64,
    config_path: PathBuf,
}

/// Error of the best k-th percentile of configurations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BestErrors {
    /// Best 10%.
    #[serde(rename = "best_10_error")]
    pub best_10: Option<f64>,
    /// Best 25%.
    #[serde(rename = "best_25_error")]
    pub best_25: Option<f64>,
    /// Best 50%.
    #[serde(rename = "best_50_error")]
    pub best_50: Option<f64>,
    /// Best 90%.
    #[serde(rename = "best_90_error")]
    pub best_90: Option<f64>,
    /// Best configuration.
    #[serde(rename = "best_100_error")]
    pub best_100: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BenchmarkFile {
    api: ApiSection,
    max_fidelity: f64,
    #[serde(default)]
    optimum: Option<f64>,
    #[serde(default)]
    prior_highest_fidelity_error: Option<f64>,
    #[serde(flatten)]
    best_errors: BestErrors,
}

#[derive(Debug, Deserialize)]
struct ApiSection {
    name: String,
    #[serde(default)]
    prior: Option<String>,
    #[serde(default)]
    epsilon: Option<f64>,
    #[serde(default)]
    task_id: Option<String>,
}

impl Benchmark {
    /// Create benchmark metadata directly.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `max_fidelity` is not positive.
    pub fn new(name: impl Into<String>, max_fidelity: f64) -> Result<Self> {
        let name = name.into();
        check_max_fidelity(&name, max_fidelity)?;
        Ok(Self {
            basename: name.clone(),
            name,
            prior: None,
            task_id: None,
            epsilon: None,
            optimum: None,
            prior_error: None,
            best_errors: BestErrors::default(),
            max_fidelity,
            config_path: PathBuf::new(),
        })
    }

    /// Read `{config_dir}/{name}.yaml`.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the file does not exist
    /// - `Error::Yaml` if it is malformed
    /// - `Error::InvalidInput` if `max_fidelity` is not positive
    pub fn from_name(name: &str, config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(format!("{name}.yaml"));
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "expected benchmark config {} to exist",
                path.display()
            )));
        }

        let file: BenchmarkFile = serde_yaml::from_reader(BufReader::new(File::open(&path)?))?;
        check_max_fidelity(name, file.max_fidelity)?;

        Ok(Self {
            name: name.to_string(),
            basename: file.api.name,
            prior: file.api.prior,
            task_id: file.api.task_id,
            epsilon: file.api.epsilon,
            optimum: file.optimum,
            prior_error: file.prior_highest_fidelity_error,
            best_errors: file.best_errors,
            max_fidelity: file.max_fidelity,
            config_path: path,
        })
    }

    /// Benchmark name as used in the results layout.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the underlying benchmark family.
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Prior used for this benchmark variant, if any.
    #[must_use]
    pub fn prior(&self) -> Option<&str> {
        self.prior.as_deref()
    }

    /// Task id, for benchmarks with several tasks.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Prior perturbation, if any.
    #[must_use]
    pub const fn epsilon(&self) -> Option<f64> {
        self.epsilon
    }

    /// Known optimum, if any.
    #[must_use]
    pub const fn optimum(&self) -> Option<f64> {
        self.optimum
    }

    /// Error of the prior configuration at the highest fidelity.
    #[must_use]
    pub const fn prior_error(&self) -> Option<f64> {
        self.prior_error
    }

    /// Best-k reference errors.
    #[must_use]
    pub const fn best_errors(&self) -> BestErrors {
        self.best_errors
    }

    /// Maximum fidelity a single evaluation can consume.
    #[must_use]
    pub const fn max_fidelity(&self) -> f64 {
        self.max_fidelity
    }

    /// Path the metadata was read from (empty when built directly).
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

fn check_max_fidelity(name: &str, max_fidelity: f64) -> Result<()> {
    if max_fidelity.is_finite() && max_fidelity > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "benchmark {name}: max_fidelity must be positive, got {max_fidelity}"
        )))
    }
}
