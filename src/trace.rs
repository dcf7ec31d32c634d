//! Trace - the ordered evaluation records of one (benchmark, algorithm, seed)
//!
//! Every transform is a pure function of the input trace and returns a new
//! `Trace`; records are copied, never mutated in place.
//!
//! ```text
//! raw trace ──► with_continuations ──► with_cumulative_fidelity
//!                                            │
//!                     series ◄── rescale_xaxis ◄── incumbent_trace
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{Axis, EvaluationRecord};
use crate::table::Series;
use crate::{Error, Result};

/// Ordered sequence of evaluation records for one seed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    records: Vec<EvaluationRecord>,
}

impl Trace {
    /// Create a trace sorted by end timestamp ascending.
    #[must_use]
    pub fn new(mut records: Vec<EvaluationRecord>) -> Self {
        records.sort_by(|a, b| a.end_time().total_cmp(&b.end_time()));
        Self { records }
    }

    /// Wrap records that are already in the desired order.
    pub(crate) const fn from_ordered(records: Vec<EvaluationRecord>) -> Self {
        Self { records }
    }

    /// Records in trace order.
    #[must_use]
    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the trace holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in trace order.
    pub fn iter(&self) -> std::slice::Iter<'_, EvaluationRecord> {
        self.records.iter()
    }

    /// Sorted, de-duplicated values of `axis` across the trace.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if any record lacks the axis.
    pub fn indices(&self, axis: Axis) -> Result<Vec<f64>> {
        let mut xs = self
            .records
            .iter()
            .map(|r| r.axis_value(axis))
            .collect::<Result<Vec<_>>>()?;
        sort_dedup(&mut xs);
        Ok(xs)
    }

    /// Resolve the record `record` was stitched onto, if it is in this trace.
    #[must_use]
    pub fn continuation_of(&self, record: &EvaluationRecord) -> Option<&EvaluationRecord> {
        let key = record.continued_from()?;
        self.records.iter().find(|r| r.key() == key)
    }

    /// Convert repeated evaluations of a configuration at rising brackets into
    /// incremental records.
    ///
    /// The lowest-bracket record of each configuration is kept as is; each
    /// later one keeps only the fidelity and cost consumed since the previous
    /// bracket. Output is sorted by end timestamp.
    ///
    /// # Errors
    ///
    /// - `Error::ContinuationExists` if a record was already stitched
    /// - `Error::InvalidInput` if a configuration repeats a bracket, or the
    ///   stitched trace does not hold one record per input record
    pub fn with_continuations(&self) -> Result<Self> {
        let mut by_config: BTreeMap<u64, Vec<&EvaluationRecord>> = BTreeMap::new();
        for record in &self.records {
            by_config.entry(record.id()).or_default().push(record);
        }

        let mut stitched = Vec::with_capacity(self.records.len());
        for mut group in by_config.into_values() {
            group.sort_by_key(|r| r.bracket_or_zero());
            stitched.push(group[0].clone());
            for pair in group.windows(2) {
                stitched.push(pair[1].continue_from(pair[0])?);
            }
        }
        if stitched.len() != self.records.len() {
            return Err(Error::InvalidInput(format!(
                "stitching produced {} records from {}",
                stitched.len(),
                self.records.len()
            )));
        }

        Ok(Self::new(stitched))
    }

    /// Assign each record the running total of fidelity consumed so far.
    ///
    /// With at most one worker every record must share the same worker id
    /// (or none). With several workers each worker accumulates its own total;
    /// records of different workers landing on the same total are collapsed to
    /// the one with the lowest `yaxis` value, which must be `Axis::Loss`.
    /// Output is sorted by `cumulated_fidelity`.
    ///
    /// # Errors
    ///
    /// - `Error::InconsistentWorkers` if worker ids do not fit the mode
    /// - `Error::Unsupported` if `yaxis` is not `Axis::Loss` in multi-worker mode
    pub fn with_cumulative_fidelity(&self, n_workers: Option<usize>, yaxis: Axis) -> Result<Self> {
        match n_workers {
            None | Some(0 | 1) => self.cumulate_single_worker(),
            Some(_) => self.cumulate_multi_worker(yaxis),
        }
    }

    fn cumulate_single_worker(&self) -> Result<Self> {
        if let Some(first) = self.records.first() {
            if self.records.iter().any(|r| r.process_id() != first.process_id()) {
                return Err(Error::InconsistentWorkers(
                    "single-worker accumulation over records from several workers".to_string(),
                ));
            }
        }

        let mut ordered = self.records.clone();
        ordered.sort_by(|a, b| a.end_time().total_cmp(&b.end_time()));
        let cumulated = ordered
            .iter()
            .scan(0.0, |total, record| {
                *total += record.fidelity();
                Some(record.with_cumulated_fidelity(*total))
            })
            .collect();

        Ok(Self::from_ordered(cumulated))
    }

    fn cumulate_multi_worker(&self, yaxis: Axis) -> Result<Self> {
        let mut per_worker: BTreeMap<u64, Vec<EvaluationRecord>> = BTreeMap::new();
        for record in &self.records {
            let worker = record.process_id().ok_or_else(|| {
                Error::InconsistentWorkers(format!(
                    "record {} has no worker id in multi-worker accumulation",
                    record.key()
                ))
            })?;
            per_worker.entry(worker).or_default().push(record.clone());
        }

        if yaxis != Axis::Loss {
            return Err(Error::Unsupported(format!(
                "deduplicating cumulated fidelity by `{yaxis}`, only `loss` is supported"
            )));
        }
        debug!(workers = per_worker.len(), "accumulating fidelity per worker");

        let mut merged = Vec::with_capacity(self.records.len());
        for records in per_worker.into_values() {
            merged.extend(Self::from_ordered(records).cumulate_single_worker()?.records);
        }
        let merged = sorted_by_axis(merged, Axis::CumulatedFidelity)?;

        // Keep the lowest loss among records sharing a cumulated fidelity
        let deduped = merged.into_iter().fold(
            Vec::<EvaluationRecord>::new(),
            |mut kept, record| {
                match kept.last_mut() {
                    Some(last) if last.cumulated_fidelity() == record.cumulated_fidelity() => {
                        if record.loss() < last.loss() {
                            *last = record;
                        }
                    }
                    _ => kept.push(record),
                }
                kept
            },
        );

        Ok(Self::from_ordered(deduped))
    }

    /// Reduce the trace to its best-so-far step function over `xaxis`.
    ///
    /// The first record (by `xaxis`) is always kept; afterwards a record is
    /// kept only if its loss is strictly lower than the current incumbent's.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` if `yaxis` is not `Axis::Loss`
    /// - `Error::MissingAxis` if a record lacks `xaxis`
    pub fn incumbent_trace(&self, xaxis: Axis, yaxis: Axis) -> Result<Self> {
        if yaxis != Axis::Loss {
            return Err(Error::Unsupported(format!(
                "incumbent trace over `{yaxis}`, only `loss` is supported"
            )));
        }

        let ordered = sorted_by_axis(self.records.clone(), xaxis)?;
        let incumbents = ordered.into_iter().fold(
            Vec::<EvaluationRecord>::new(),
            |mut incumbents, record| {
                if incumbents.last().map_or(true, |inc| record.loss() < inc.loss()) {
                    incumbents.push(record);
                }
                incumbents
            },
        );

        Ok(Self::from_ordered(incumbents))
    }

    /// Keep records whose `axis` value lies in `[low, high]`, sorted by `axis`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if a record lacks `axis`.
    pub fn in_range(&self, low: f64, high: f64, axis: Axis) -> Result<Self> {
        let mut kept = Vec::new();
        for record in &self.records {
            let x = record.axis_value(axis)?;
            if low <= x && x <= high {
                kept.push(record.clone());
            }
        }
        Ok(Self::from_ordered(sorted_by_axis(kept, axis)?))
    }

    /// Multiply every record's `axis` value by `factor`, sorted by the new value.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if a record lacks `axis`.
    pub fn rescale_xaxis(&self, axis: Axis, factor: f64) -> Result<Self> {
        let rescaled = self
            .records
            .iter()
            .map(|r| Ok(r.with_axis(axis, r.axis_value(axis)? * factor)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_ordered(sorted_by_axis(rescaled, axis)?))
    }

    /// Project the trace onto `(index, values)`, sorted by index.
    ///
    /// A repeated index value keeps the record latest in the trace.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if a record lacks either axis.
    pub fn series(&self, index: Axis, values: Axis) -> Result<Series> {
        let points = self
            .records
            .iter()
            .map(|r| Ok((r.axis_value(index)?, r.axis_value(values)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Series::new(points))
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a EvaluationRecord;
    type IntoIter = std::slice::Iter<'a, EvaluationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Stable sort of records by an axis value.
fn sorted_by_axis(records: Vec<EvaluationRecord>, axis: Axis) -> Result<Vec<EvaluationRecord>> {
    let mut keyed = records
        .into_iter()
        .map(|r| Ok((r.axis_value(axis)?, r)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, r)| r).collect())
}

/// Sort ascending and drop exact duplicates.
pub(crate) fn sort_dedup(xs: &mut Vec<f64>) {
    xs.sort_by(f64::total_cmp);
    xs.dedup_by(|a, b| a == b);
}
