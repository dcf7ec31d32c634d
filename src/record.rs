//! Evaluation Record - one completed trial of one configuration at one fidelity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Numeric record field usable as an x- or y-axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Objective value, lower is better.
    Loss,
    /// Cost reported by the evaluation.
    Cost,
    /// Validation score.
    ValScore,
    /// Test score.
    TestScore,
    /// Budget consumed by the evaluation.
    Fidelity,
    /// Wall-clock start timestamp.
    StartTime,
    /// Wall-clock end timestamp.
    EndTime,
    /// Loss of the same configuration at maximum fidelity.
    MaxFidelityLoss,
    /// Cost of the same configuration at maximum fidelity.
    MaxFidelityCost,
    /// Running total of fidelity (derived).
    CumulatedFidelity,
    /// Start time relative to the run's first evaluation (derived).
    StartTimeSinceGlobalStart,
    /// End time relative to the run's first evaluation (derived).
    EndTimeSinceGlobalStart,
}

impl Axis {
    /// All axes in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Loss,
        Self::Cost,
        Self::ValScore,
        Self::TestScore,
        Self::Fidelity,
        Self::StartTime,
        Self::EndTime,
        Self::MaxFidelityLoss,
        Self::MaxFidelityCost,
        Self::CumulatedFidelity,
        Self::StartTimeSinceGlobalStart,
        Self::EndTimeSinceGlobalStart,
    ];

    /// Field name as written in configs and column headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loss => "loss",
            Self::Cost => "cost",
            Self::ValScore => "val_score",
            Self::TestScore => "test_score",
            Self::Fidelity => "fidelity",
            Self::StartTime => "start_time",
            Self::EndTime => "end_time",
            Self::MaxFidelityLoss => "max_fidelity_loss",
            Self::MaxFidelityCost => "max_fidelity_cost",
            Self::CumulatedFidelity => "cumulated_fidelity",
            Self::StartTimeSinceGlobalStart => "start_time_since_global_start",
            Self::EndTimeSinceGlobalStart => "end_time_since_global_start",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|axis| axis.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown axis `{s}`")))
    }
}

/// Identity of a record inside its trace: configuration id plus bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Configuration identifier.
    pub id: u64,
    /// Bracket/rung index, if the optimizer reports one.
    pub bracket: Option<u32>,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bracket {
            Some(bracket) => write!(f, "{}_{bracket}", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// One completed trial of one configuration at one fidelity level.
///
/// Records are immutable; every transformation returns a modified copy.
/// `continued_from` holds the [`RecordKey`] of the lower-bracket evaluation
/// this record was stitched onto, never an owned copy of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    id: u64,
    bracket: Option<u32>,
    #[serde(with = "float_repr")]
    loss: f64,
    #[serde(with = "float_repr")]
    cost: f64,
    #[serde(with = "float_repr")]
    val_score: f64,
    #[serde(with = "float_repr")]
    test_score: f64,
    #[serde(with = "float_repr")]
    fidelity: f64,
    #[serde(with = "float_repr")]
    start_time: f64,
    #[serde(with = "float_repr")]
    end_time: f64,
    #[serde(with = "float_repr")]
    max_fidelity_loss: f64,
    #[serde(with = "float_repr")]
    max_fidelity_cost: f64,
    #[serde(with = "float_repr::option")]
    cumulated_fidelity: Option<f64>,
    #[serde(with = "float_repr::option")]
    start_time_since_global_start: Option<f64>,
    #[serde(with = "float_repr::option")]
    end_time_since_global_start: Option<f64>,
    continued_from: Option<RecordKey>,
    process_id: Option<u64>,
}

impl EvaluationRecord {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(id: u64, loss: f64, fidelity: f64) -> EvaluationRecordBuilder {
        EvaluationRecordBuilder::new(id, loss, fidelity)
    }

    /// Configuration identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Bracket/rung index.
    #[must_use]
    pub const fn bracket(&self) -> Option<u32> {
        self.bracket
    }

    /// Bracket index with an absent bracket treated as 0.
    #[must_use]
    pub fn bracket_or_zero(&self) -> u32 {
        self.bracket.unwrap_or(0)
    }

    /// Key identifying this record within its trace.
    #[must_use]
    pub const fn key(&self) -> RecordKey {
        RecordKey {
            id: self.id,
            bracket: self.bracket,
        }
    }

    /// Loss (lower is better).
    #[must_use]
    pub const fn loss(&self) -> f64 {
        self.loss
    }

    /// Cost.
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Validation score.
    #[must_use]
    pub const fn val_score(&self) -> f64 {
        self.val_score
    }

    /// Test score.
    #[must_use]
    pub const fn test_score(&self) -> f64 {
        self.test_score
    }

    /// Fidelity consumed by this trial.
    #[must_use]
    pub const fn fidelity(&self) -> f64 {
        self.fidelity
    }

    /// Wall-clock start timestamp.
    #[must_use]
    pub const fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Wall-clock end timestamp.
    #[must_use]
    pub const fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Loss of this configuration at maximum fidelity.
    #[must_use]
    pub const fn max_fidelity_loss(&self) -> f64 {
        self.max_fidelity_loss
    }

    /// Cost of this configuration at maximum fidelity.
    #[must_use]
    pub const fn max_fidelity_cost(&self) -> f64 {
        self.max_fidelity_cost
    }

    /// Running fidelity total, once accumulated.
    #[must_use]
    pub const fn cumulated_fidelity(&self) -> Option<f64> {
        self.cumulated_fidelity
    }

    /// Start time relative to the run's global start.
    #[must_use]
    pub const fn start_time_since_global_start(&self) -> Option<f64> {
        self.start_time_since_global_start
    }

    /// End time relative to the run's global start.
    #[must_use]
    pub const fn end_time_since_global_start(&self) -> Option<f64> {
        self.end_time_since_global_start
    }

    /// Key of the lower-bracket record this one continues from.
    #[must_use]
    pub const fn continued_from(&self) -> Option<RecordKey> {
        self.continued_from
    }

    /// Worker/process identifier.
    #[must_use]
    pub const fn process_id(&self) -> Option<u64> {
        self.process_id
    }

    /// Value of `axis`, `None` when a derived field has not been computed.
    #[must_use]
    pub const fn value(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::Loss => Some(self.loss),
            Axis::Cost => Some(self.cost),
            Axis::ValScore => Some(self.val_score),
            Axis::TestScore => Some(self.test_score),
            Axis::Fidelity => Some(self.fidelity),
            Axis::StartTime => Some(self.start_time),
            Axis::EndTime => Some(self.end_time),
            Axis::MaxFidelityLoss => Some(self.max_fidelity_loss),
            Axis::MaxFidelityCost => Some(self.max_fidelity_cost),
            Axis::CumulatedFidelity => self.cumulated_fidelity,
            Axis::StartTimeSinceGlobalStart => self.start_time_since_global_start,
            Axis::EndTimeSinceGlobalStart => self.end_time_since_global_start,
        }
    }

    /// Value of `axis`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingAxis` if the axis is a derived field that was
    /// never computed for this record.
    pub fn axis_value(&self, axis: Axis) -> Result<f64> {
        self.value(axis)
            .ok_or(Error::MissingAxis { axis, id: self.id })
    }

    /// Copy of this record with `axis` set to `value`.
    #[must_use]
    pub fn with_axis(&self, axis: Axis, value: f64) -> Self {
        let mut copy = self.clone();
        match axis {
            Axis::Loss => copy.loss = value,
            Axis::Cost => copy.cost = value,
            Axis::ValScore => copy.val_score = value,
            Axis::TestScore => copy.test_score = value,
            Axis::Fidelity => copy.fidelity = value,
            Axis::StartTime => copy.start_time = value,
            Axis::EndTime => copy.end_time = value,
            Axis::MaxFidelityLoss => copy.max_fidelity_loss = value,
            Axis::MaxFidelityCost => copy.max_fidelity_cost = value,
            Axis::CumulatedFidelity => copy.cumulated_fidelity = Some(value),
            Axis::StartTimeSinceGlobalStart => copy.start_time_since_global_start = Some(value),
            Axis::EndTimeSinceGlobalStart => copy.end_time_since_global_start = Some(value),
        }
        copy
    }

    /// Copy with the running fidelity total set.
    #[must_use]
    pub fn with_cumulated_fidelity(&self, cumulated: f64) -> Self {
        self.with_axis(Axis::CumulatedFidelity, cumulated)
    }

    /// Copy with start/end times expressed relative to `global_start`.
    #[must_use]
    pub fn relative_to(&self, global_start: f64) -> Self {
        Self {
            start_time_since_global_start: Some(self.start_time - global_start),
            end_time_since_global_start: Some(self.end_time - global_start),
            ..self.clone()
        }
    }

    /// Stitch this record onto a lower-bracket evaluation of the same
    /// configuration, keeping only the fidelity and cost consumed since.
    ///
    /// # Errors
    ///
    /// - `Error::ContinuationExists` if this record was already stitched
    /// - `Error::InvalidInput` if `lower` is a different configuration or
    ///   not at a lower bracket
    pub fn continue_from(&self, lower: &Self) -> Result<Self> {
        if self.continued_from.is_some() {
            return Err(Error::ContinuationExists {
                id: self.id,
                bracket: self.bracket,
            });
        }
        if lower.id != self.id || lower.bracket_or_zero() >= self.bracket_or_zero() {
            return Err(Error::InvalidInput(format!(
                "record {} cannot continue from {}",
                self.key(),
                lower.key()
            )));
        }

        Ok(Self {
            fidelity: self.fidelity - lower.fidelity,
            cost: self.cost - lower.cost,
            continued_from: Some(lower.key()),
            ..self.clone()
        })
    }
}

/// Builder for `EvaluationRecord`.
#[derive(Debug, Clone)]
pub struct EvaluationRecordBuilder {
    record: EvaluationRecord,
}

impl EvaluationRecordBuilder {
    /// Create a new builder with required fields; everything else starts at zero/absent.
    #[must_use]
    pub const fn new(id: u64, loss: f64, fidelity: f64) -> Self {
        Self {
            record: EvaluationRecord {
                id,
                bracket: None,
                loss,
                cost: 0.0,
                val_score: 0.0,
                test_score: 0.0,
                fidelity,
                start_time: 0.0,
                end_time: 0.0,
                max_fidelity_loss: 0.0,
                max_fidelity_cost: 0.0,
                cumulated_fidelity: None,
                start_time_since_global_start: None,
                end_time_since_global_start: None,
                continued_from: None,
                process_id: None,
            },
        }
    }

    /// Set the bracket index.
    #[must_use]
    pub const fn bracket(mut self, bracket: u32) -> Self {
        self.record.bracket = Some(bracket);
        self
    }

    /// Set the cost.
    #[must_use]
    pub const fn cost(mut self, cost: f64) -> Self {
        self.record.cost = cost;
        self
    }

    /// Set validation and test scores.
    #[must_use]
    pub const fn scores(mut self, val_score: f64, test_score: f64) -> Self {
        self.record.val_score = val_score;
        self.record.test_score = test_score;
        self
    }

    /// Set wall-clock start and end timestamps.
    #[must_use]
    pub const fn times(mut self, start_time: f64, end_time: f64) -> Self {
        self.record.start_time = start_time;
        self.record.end_time = end_time;
        self
    }

    /// Set the maximum-fidelity reference loss and cost.
    #[must_use]
    pub const fn max_fidelity(mut self, loss: f64, cost: f64) -> Self {
        self.record.max_fidelity_loss = loss;
        self.record.max_fidelity_cost = cost;
        self
    }

    /// Set the worker/process identifier.
    #[must_use]
    pub const fn process_id(mut self, process_id: u64) -> Self {
        self.record.process_id = Some(process_id);
        self
    }

    /// Set a precomputed running fidelity total.
    #[must_use]
    pub const fn cumulated_fidelity(mut self, cumulated: f64) -> Self {
        self.record.cumulated_fidelity = Some(cumulated);
        self
    }

    /// Build the `EvaluationRecord`.
    #[must_use]
    pub fn build(self) -> EvaluationRecord {
        self.record
    }
}

/// Serde adapter for float fields: finite values are plain numbers, `NaN` and
/// infinities are written as the strings `"NaN"`, `"inf"` and `"-inf"` so that
/// JSON (which has no literal for them) reads them back.
mod float_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    struct Float(f64);

    impl Serialize for Float {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serialize(&self.0, serializer)
        }
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    fn from_repr<E: serde::de::Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                _ => Err(E::custom(format!("invalid float `{text}`"))),
            },
        }
    }

    pub mod option {
        use super::{from_repr, Float, Repr};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
            value.map(Float).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
            Option::<Repr>::deserialize(deserializer)?
                .map(from_repr)
                .transpose()
        }
    }
}
