//! Integration tests for per-seed trace transforms
//!
//! Covers continuation stitching, cumulative fidelity, incumbent extraction
//! and axis rescaling end to end.

use hpo_traces::{Axis, Error, EvaluationRecord, RecordKey, Trace};

fn record(id: u64, bracket: u32, fidelity: f64, loss: f64, end: f64) -> EvaluationRecord {
    EvaluationRecord::builder(id, loss, fidelity)
        .bracket(bracket)
        .cost(fidelity * 10.0)
        .times(end - 0.5, end)
        .build()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
    }
}

// ============================================================================
// Continuation stitching
// ============================================================================

#[test]
fn test_stitching_three_brackets_then_incumbents() {
    let trace = Trace::new(vec![
        record(0, 2, 5.0, 0.2, 3.0),
        record(0, 0, 1.0, 0.9, 1.0),
        record(0, 1, 3.0, 0.5, 2.0),
    ]);

    let stitched = trace.with_continuations().unwrap();
    let fidelities: Vec<f64> = stitched.iter().map(EvaluationRecord::fidelity).collect();
    let costs: Vec<f64> = stitched.iter().map(EvaluationRecord::cost).collect();
    assert_close(&fidelities, &[1.0, 2.0, 2.0]);
    assert_close(&costs, &[10.0, 20.0, 20.0]);

    let back_refs: Vec<Option<RecordKey>> =
        stitched.iter().map(EvaluationRecord::continued_from).collect();
    assert_eq!(back_refs[0], None);
    assert_eq!(back_refs[1], Some(RecordKey { id: 0, bracket: Some(0) }));
    assert_eq!(back_refs[2], Some(RecordKey { id: 0, bracket: Some(1) }));

    let incumbents = stitched.incumbent_trace(Axis::EndTime, Axis::Loss).unwrap();
    let brackets: Vec<Option<u32>> = incumbents.iter().map(EvaluationRecord::bracket).collect();
    assert_eq!(brackets, vec![Some(0), Some(1), Some(2)]);
}

#[test]
fn test_stitching_resolves_back_reference_within_trace() {
    let stitched = Trace::new(vec![record(4, 0, 1.0, 0.6, 1.0), record(4, 1, 3.0, 0.4, 2.0)])
        .with_continuations()
        .unwrap();

    let upper = &stitched.records()[1];
    let lower = stitched.continuation_of(upper).unwrap();
    assert_eq!(lower.key().to_string(), "4_0");
    assert!(stitched.continuation_of(lower).is_none());
}

#[test]
fn test_stitching_twice_is_an_invariant_violation() {
    let stitched = Trace::new(vec![record(1, 0, 1.0, 0.6, 1.0), record(1, 1, 3.0, 0.4, 2.0)])
        .with_continuations()
        .unwrap();

    let err = stitched.with_continuations().unwrap_err();
    assert!(matches!(
        err,
        Error::ContinuationExists {
            id: 1,
            bracket: Some(1)
        }
    ));
}

#[test]
fn test_stitching_repeated_bracket_is_rejected() {
    let trace = Trace::new(vec![
        record(1, 0, 1.0, 0.6, 1.0),
        record(1, 0, 1.0, 0.5, 2.0),
        record(1, 1, 3.0, 0.4, 3.0),
    ]);

    let err = trace.with_continuations().unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_stitching_leaves_single_evaluations_untouched() {
    let trace = Trace::new(vec![record(1, 0, 1.0, 0.6, 2.0), record(2, 0, 1.0, 0.4, 1.0)]);
    let stitched = trace.with_continuations().unwrap();
    assert_eq!(stitched, trace);
}

// ============================================================================
// Cumulative fidelity
// ============================================================================

#[test]
fn test_single_worker_running_total() {
    let trace = Trace::new(
        [1.0, 1.0, 3.0, 1.0, 9.0]
            .iter()
            .enumerate()
            .map(|(i, &f)| record(i as u64, 0, f, 0.5, i as f64 + 1.0))
            .collect(),
    );

    let cumulated = trace.with_cumulative_fidelity(None, Axis::Loss).unwrap();
    let totals: Vec<f64> = cumulated
        .iter()
        .map(|r| r.cumulated_fidelity().unwrap())
        .collect();
    assert_close(&totals, &[1.0, 2.0, 5.0, 6.0, 15.0]);
}

#[test]
fn test_single_worker_rejects_mixed_workers() {
    let trace = Trace::new(vec![
        EvaluationRecord::builder(0, 0.5, 1.0).process_id(0).build(),
        EvaluationRecord::builder(1, 0.5, 1.0).process_id(1).build(),
    ]);
    let err = trace.with_cumulative_fidelity(Some(1), Axis::Loss).unwrap_err();
    assert!(matches!(err, Error::InconsistentWorkers(_)));
}

#[test]
fn test_multi_worker_requires_worker_ids() {
    let trace = Trace::new(vec![
        EvaluationRecord::builder(0, 0.5, 1.0).process_id(0).build(),
        EvaluationRecord::builder(1, 0.5, 1.0).build(),
    ]);
    let err = trace.with_cumulative_fidelity(Some(2), Axis::Loss).unwrap_err();
    assert!(matches!(err, Error::InconsistentWorkers(_)));
}

#[test]
fn test_multi_worker_collapses_equal_totals_to_lowest_loss() {
    let worker = |id: u64, pid: u64, fidelity: f64, loss: f64, end: f64| {
        EvaluationRecord::builder(id, loss, fidelity)
            .process_id(pid)
            .times(end - 0.5, end)
            .build()
    };
    let trace = Trace::new(vec![
        worker(0, 0, 1.0, 0.7, 1.0),
        worker(1, 1, 1.0, 0.6, 2.0),
        worker(2, 0, 2.0, 0.5, 3.0),
        worker(3, 1, 2.0, 0.5, 4.0),
    ]);

    let cumulated = trace.with_cumulative_fidelity(Some(2), Axis::Loss).unwrap();
    let totals: Vec<f64> = cumulated
        .iter()
        .map(|r| r.cumulated_fidelity().unwrap())
        .collect();
    let ids: Vec<u64> = cumulated.iter().map(EvaluationRecord::id).collect();

    assert_close(&totals, &[1.0, 3.0]);
    // Lower loss wins at 1.0; the earlier worker wins the tie at 3.0
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_multi_worker_rejects_non_loss_metric() {
    let trace = Trace::new(vec![EvaluationRecord::builder(0, 0.5, 1.0).process_id(0).build()]);
    let err = trace
        .with_cumulative_fidelity(Some(4), Axis::ValScore)
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

// ============================================================================
// Incumbents, range and rescale
// ============================================================================

#[test]
fn test_incumbent_keeps_only_strict_improvements() {
    let trace = Trace::new(vec![
        record(0, 0, 1.0, 0.5, 1.0),
        record(1, 0, 1.0, 0.5, 2.0),
        record(2, 0, 1.0, 0.7, 3.0),
        record(3, 0, 1.0, 0.1, 4.0),
    ]);
    let incumbents = trace.incumbent_trace(Axis::EndTime, Axis::Loss).unwrap();
    let ids: Vec<u64> = incumbents.iter().map(EvaluationRecord::id).collect();
    assert_eq!(ids, vec![0, 3]);
}

#[test]
fn test_incumbent_of_empty_trace_is_empty() {
    let incumbents = Trace::default()
        .incumbent_trace(Axis::EndTime, Axis::Loss)
        .unwrap();
    assert!(incumbents.is_empty());
}

#[test]
fn test_incumbent_rejects_non_loss_metric() {
    let err = Trace::new(vec![record(0, 0, 1.0, 0.5, 1.0)])
        .incumbent_trace(Axis::EndTime, Axis::TestScore)
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn test_incumbent_over_missing_axis_fails() {
    let err = Trace::new(vec![record(0, 0, 1.0, 0.5, 1.0)])
        .incumbent_trace(Axis::CumulatedFidelity, Axis::Loss)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingAxis {
            axis: Axis::CumulatedFidelity,
            id: 0
        }
    ));
}

#[test]
fn test_rescale_by_max_fidelity() {
    let trace = Trace::new(vec![record(0, 0, 100.0, 0.5, 1.0), record(1, 0, 25.0, 0.4, 2.0)]);
    let rescaled = trace.rescale_xaxis(Axis::Fidelity, 1.0 / 100.0).unwrap();
    let values: Vec<f64> = rescaled.iter().map(EvaluationRecord::fidelity).collect();
    assert_close(&values, &[0.25, 1.0]);
}

#[test]
fn test_in_range_is_inclusive() {
    let trace = Trace::new((1..=5).map(|i| record(i, 0, 1.0, 0.5, f64::from(i as u32))).collect());
    let kept = trace.in_range(2.0, 4.0, Axis::EndTime).unwrap();
    let ids: Vec<u64> = kept.iter().map(EvaluationRecord::id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
}

#[test]
fn test_series_projection() {
    let trace = Trace::new(vec![record(0, 0, 1.0, 0.5, 2.0), record(1, 0, 1.0, 0.4, 1.0)]);
    let series = trace.series(Axis::EndTime, Axis::Loss).unwrap();
    assert_eq!(series.points(), &[(1.0, 0.4), (2.0, 0.5)]);
}
