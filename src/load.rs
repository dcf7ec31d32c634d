//! Raw result loading
//!
//! Two on-disk layouts are unified into a [`Trace`]:
//!
//! ```text
//! seed=0/
//! ├── neps_root_directory/results/config_{id}[_{bracket}]/result.yaml   (Format A)
//! └── hpbandster_root_directory/{configs,results}.json                  (Format B)
//! ```
//!
//! Experiments are laid out as `benchmark={b}/algorithm={a}/seed={s}/`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::record::EvaluationRecord;
use crate::trace::{sort_dedup, Trace};
use crate::{Error, Result};

/// Raw record layout of one seed directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// One directory per configuration evaluation with a `result.yaml`.
    Neps,
    /// Line-delimited `configs.json` / `results.json` logs.
    Hpbandster,
}

impl SourceFormat {
    /// Sentinel subdirectory marking this format.
    #[must_use]
    pub const fn root_dir(self) -> &'static str {
        match self {
            Self::Neps => "neps_root_directory",
            Self::Hpbandster => "hpbandster_root_directory",
        }
    }

    /// Detect the format present in a seed directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Format` if neither sentinel directory exists.
    pub fn detect(path: &Path) -> Result<Self> {
        [Self::Neps, Self::Hpbandster]
            .into_iter()
            .find(|format| path.join(format.root_dir()).is_dir())
            .ok_or_else(|| Error::Format {
                path: path.to_path_buf(),
            })
    }

    /// Decode every record of a seed directory in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if files are unreadable or malformed, or if no
    /// records are found.
    pub fn load(self, path: &Path) -> Result<Trace> {
        let root = path.join(self.root_dir());
        match self {
            Self::Neps => load_neps(&root),
            Self::Hpbandster => load_hpbandster(&root),
        }
    }
}

/// Detect the format of `path` and load its trace.
///
/// # Errors
///
/// Returns `Error::Format` for an unknown layout, or any decode error.
pub fn load_trace(path: &Path) -> Result<Trace> {
    let format = SourceFormat::detect(path)?;
    let trace = format.load(path)?;
    debug!(path = %path.display(), ?format, records = trace.len(), "loaded trace");
    Ok(trace)
}

/// Values of `{key}={value}` subdirectories of `path`, sorted.
///
/// # Errors
///
/// Returns `Error::Io` if `path` cannot be listed.
pub fn discover(path: &Path, key: &str) -> Result<Vec<String>> {
    let prefix = format!("{key}=");
    let mut values = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(value) = entry.file_name().to_str().and_then(|n| n.strip_prefix(&prefix)) {
            values.push(value.to_string());
        }
    }
    values.sort();
    Ok(values)
}

/// Seeds stored under an algorithm directory, ascending.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for a non-numeric `seed=` directory.
pub fn discover_seeds(path: &Path) -> Result<Vec<u32>> {
    let mut seeds = discover(path, "seed")?
        .into_iter()
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| Error::InvalidInput(format!("bad seed directory `seed={s}` in {}", path.display())))
        })
        .collect::<Result<Vec<_>>>()?;
    seeds.sort_unstable();
    Ok(seeds)
}

/// `{results}/benchmark={b}/algorithm={a}/seed={s}`
#[must_use]
pub fn seed_dir(results: &Path, benchmark: &str, algorithm: &str, seed: u32) -> PathBuf {
    algorithm_dir(results, benchmark, algorithm).join(format!("seed={seed}"))
}

/// `{results}/benchmark={b}/algorithm={a}`
#[must_use]
pub fn algorithm_dir(results: &Path, benchmark: &str, algorithm: &str) -> PathBuf {
    results
        .join(format!("benchmark={benchmark}"))
        .join(format!("algorithm={algorithm}"))
}

// ============================================================================
// Format A
// ============================================================================

#[derive(Debug, Deserialize)]
struct NepsResult {
    loss: f64,
    cost: f64,
    info_dict: NepsInfo,
}

#[derive(Debug, Deserialize)]
struct NepsInfo {
    val_score: f64,
    test_score: f64,
    fidelity: f64,
    start_time: f64,
    end_time: f64,
    max_fidelity_loss: f64,
    max_fidelity_cost: f64,
    #[serde(default)]
    process_id: Option<u64>,
}

fn load_neps(root: &Path) -> Result<Trace> {
    let results_dir = root.join("results");
    if !results_dir.is_dir() {
        return Err(Error::MissingData { path: results_dir });
    }

    let mut records = Vec::new();
    for entry in fs::read_dir(&results_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && name.contains("config") {
            records.push(read_neps_config(&entry.path(), &name)?);
        }
    }

    relative_trace(&records).ok_or_else(|| Error::MissingData { path: results_dir })
}

/// Express times relative to the earliest start; `None` if there are no records.
fn relative_trace(records: &[EvaluationRecord]) -> Option<Trace> {
    let global_start = records.iter().map(EvaluationRecord::start_time).reduce(f64::min)?;
    Some(Trace::new(
        records.iter().map(|r| r.relative_to(global_start)).collect(),
    ))
}

fn read_neps_config(dir: &Path, name: &str) -> Result<EvaluationRecord> {
    let (id, bracket) = parse_config_name(name)?;
    let file = File::open(dir.join("result.yaml"))?;
    let result: NepsResult = serde_yaml::from_reader(BufReader::new(file))?;
    let info = result.info_dict;

    let mut builder = EvaluationRecord::builder(id, result.loss, info.fidelity)
        .cost(result.cost)
        .scores(info.val_score, info.test_score)
        .times(info.start_time, info.end_time)
        .max_fidelity(info.max_fidelity_loss, info.max_fidelity_cost);
    if let Some(bracket) = bracket {
        builder = builder.bracket(bracket);
    }
    if let Some(pid) = info.process_id {
        builder = builder.process_id(pid);
    }
    Ok(builder.build())
}

/// `config_12` -> (12, None), `config_12_3` -> (12, Some(3))
fn parse_config_name(name: &str) -> Result<(u64, Option<u32>)> {
    let bad = || Error::InvalidInput(format!("bad config directory name `{name}`"));
    let stem = name.strip_prefix("config_").unwrap_or(name);
    match stem.split_once('_') {
        Some((id, bracket)) => Ok((
            id.parse().map_err(|_| bad())?,
            Some(bracket.parse().map_err(|_| bad())?),
        )),
        None => Ok((stem.parse().map_err(|_| bad())?, None)),
    }
}

// ============================================================================
// Format B
// ============================================================================

#[derive(Debug, Deserialize)]
struct HpTimestamps {
    started: f64,
    finished: f64,
}

#[derive(Debug, Deserialize)]
struct HpResult {
    loss: f64,
    cost: f64,
    info: HpInfo,
}

#[derive(Debug, Deserialize)]
struct HpInfo {
    val_score: f64,
    test_score: f64,
    max_fidelity_loss: f64,
    max_fidelity_cost: f64,
}

/// `[config_id, budget, timestamps, result, exception]`
type HpResultLine = (Vec<i64>, f64, HpTimestamps, HpResult, serde_json::Value);

fn load_hpbandster(root: &Path) -> Result<Trace> {
    // Opaque multi-part ids become sequential ids in first-seen order
    let mut ids: HashMap<Vec<i64>, u64> = HashMap::new();
    for (n, line) in read_lines(&root.join("configs.json"))? {
        let fields: Vec<serde_json::Value> = serde_json::from_str(&line)?;
        let raw = fields
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("configs.json line {n} is empty")))?;
        let raw: Vec<i64> = serde_json::from_value(raw)?;
        let next = ids.len() as u64;
        ids.entry(raw).or_insert(next);
    }

    let mut records = Vec::new();
    for (_, line) in read_lines(&root.join("results.json"))? {
        let (raw, budget, stamps, result, _): HpResultLine = serde_json::from_str(&line)?;
        let id = *ids
            .get(&raw)
            .ok_or_else(|| Error::NotFound(format!("config {raw:?} missing from configs.json")))?;
        let fidelity = budget.trunc();
        let builder = EvaluationRecord::builder(id, result.loss, fidelity)
            .cost(result.cost)
            .scores(result.info.val_score, result.info.test_score)
            .times(stamps.started, stamps.finished)
            .max_fidelity(result.info.max_fidelity_loss, result.info.max_fidelity_cost);
        records.push((fidelity, builder));
    }

    if records.is_empty() {
        return Err(Error::MissingData {
            path: root.join("results.json"),
        });
    }

    // Distinct budgets, ascending, are the brackets
    let mut budgets: Vec<f64> = records.iter().map(|(fidelity, _)| *fidelity).collect();
    sort_dedup(&mut budgets);
    let records: Vec<EvaluationRecord> = records
        .into_iter()
        .map(|(fidelity, builder)| {
            let rank = budgets.partition_point(|b| *b < fidelity);
            builder.bracket(u32::try_from(rank).unwrap_or(u32::MAX)).build()
        })
        .collect();

    relative_trace(&records).ok_or_else(|| Error::MissingData {
        path: root.join("results.json"),
    })
}

fn read_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push((n + 1, line));
        }
    }
    Ok(lines)
}
