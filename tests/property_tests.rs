//! Property-based tests for trace transforms and ranking
//!
//! - Test mathematical invariants of each transform
//! - Run with ProptestConfig::with_cases(100)

use std::collections::BTreeMap;

use hpo_traces::{AlgorithmResults, Axis, BenchmarkResults, EvaluationRecord, Trace};
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Trace of `n` configurations, each evaluated at 1..=3 rising brackets with
/// rising fidelity. End times are distinct.
fn arb_bracketed_trace() -> impl Strategy<Value = Trace> {
    proptest::collection::vec((1usize..=3, 0.0f64..1.0, 1u32..10), 1..15).prop_map(|configs| {
        let mut records = Vec::new();
        let mut clock = 0.0;
        for (id, (brackets, loss, step)) in configs.into_iter().enumerate() {
            for bracket in 0..brackets {
                clock += 1.0;
                let fidelity = f64::from(step) * f64::from(bracket as u32 + 1);
                records.push(
                    EvaluationRecord::builder(id as u64, loss, fidelity)
                        .bracket(bracket as u32)
                        .cost(fidelity)
                        .times(clock - 0.5, clock)
                        .build(),
                );
            }
        }
        Trace::new(records)
    })
}

/// Flat single-worker trace with positive fidelities and distinct end times.
fn arb_flat_trace() -> impl Strategy<Value = Trace> {
    proptest::collection::vec((0.0f64..1.0, 0.1f64..20.0), 1..40).prop_map(|points| {
        Trace::new(
            points
                .into_iter()
                .enumerate()
                .map(|(i, (loss, fidelity))| {
                    EvaluationRecord::builder(i as u64, loss, fidelity)
                        .times(i as f64, i as f64 + 1.0)
                        .build()
                })
                .collect(),
        )
    })
}

/// Benchmark with `k` algorithms on seed 0, losses drawn from a small set so
/// ties occur.
fn arb_benchmark() -> impl Strategy<Value = BenchmarkResults> {
    proptest::collection::vec(
        proptest::collection::vec((1u8..10, 0u8..4), 1..6),
        2..5,
    )
    .prop_map(|algorithms| {
        BenchmarkResults::new(
            algorithms
                .into_iter()
                .enumerate()
                .map(|(a, points)| {
                    let records = points
                        .into_iter()
                        .enumerate()
                        .map(|(i, (x, loss))| {
                            EvaluationRecord::builder(i as u64, f64::from(loss), 1.0)
                                .times(0.0, f64::from(x))
                                .build()
                        })
                        .collect();
                    let traces = BTreeMap::from([(0, Trace::new(records))]);
                    (format!("algo-{a}"), AlgorithmResults::new(traces))
                })
                .collect(),
        )
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Continuation Stitching Properties
    // ========================================================================

    /// Property: stitching emits exactly one record per input record
    #[test]
    fn prop_stitching_preserves_count(trace in arb_bracketed_trace()) {
        let stitched = trace.with_continuations().unwrap();
        prop_assert_eq!(stitched.len(), trace.len());
    }

    /// Property: stitched deltas match their resolved lower record
    #[test]
    fn prop_stitched_deltas_are_non_negative(trace in arb_bracketed_trace()) {
        let stitched = trace.with_continuations().unwrap();
        for record in &stitched {
            if let Some(key) = record.continued_from() {
                let unstitched_upper = trace.iter().find(|r| r.key() == record.key()).unwrap();
                let unstitched_lower = trace.iter().find(|r| r.key() == key).unwrap();
                let expected = unstitched_upper.fidelity() - unstitched_lower.fidelity();
                prop_assert!((record.fidelity() - expected).abs() < 1e-9);
                prop_assert!(record.fidelity() >= 0.0);
            }
        }
    }

    /// Property: total stitched fidelity equals the top-bracket fidelity sum
    #[test]
    fn prop_stitched_fidelity_telescopes(trace in arb_bracketed_trace()) {
        let stitched = trace.with_continuations().unwrap();
        let total: f64 = stitched.iter().map(EvaluationRecord::fidelity).sum();

        let mut top: BTreeMap<u64, (u32, f64)> = BTreeMap::new();
        for r in &trace {
            let entry = top.entry(r.id()).or_insert((0, 0.0));
            if r.bracket_or_zero() >= entry.0 {
                *entry = (r.bracket_or_zero(), r.fidelity());
            }
        }
        let expected: f64 = top.values().map(|(_, f)| f).sum();
        prop_assert!((total - expected).abs() < 1e-6);
    }

    // ========================================================================
    // Cumulative Fidelity Properties
    // ========================================================================

    /// Property: single-worker running total is non-decreasing in end time
    #[test]
    fn prop_cumulative_fidelity_non_decreasing(trace in arb_flat_trace()) {
        let cumulated = trace.with_cumulative_fidelity(None, Axis::Loss).unwrap();
        prop_assert_eq!(cumulated.len(), trace.len());

        let totals: Vec<f64> = cumulated
            .iter()
            .map(|r| r.cumulated_fidelity().unwrap())
            .collect();
        for pair in totals.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }

        let sum: f64 = trace.iter().map(EvaluationRecord::fidelity).sum();
        prop_assert!((totals[totals.len() - 1] - sum).abs() < 1e-6);
    }

    // ========================================================================
    // Incumbent Properties
    // ========================================================================

    /// Property: incumbents are sorted by x and strictly improving in loss
    #[test]
    fn prop_incumbent_strictly_improving(trace in arb_flat_trace()) {
        let incumbents = trace.incumbent_trace(Axis::EndTime, Axis::Loss).unwrap();
        prop_assert!(!incumbents.is_empty());
        prop_assert_eq!(&incumbents.records()[0], &trace.records()[0]);

        for pair in incumbents.records().windows(2) {
            prop_assert!(pair[0].end_time() <= pair[1].end_time());
            prop_assert!(pair[1].loss() < pair[0].loss());
        }

        let best = trace.iter().map(EvaluationRecord::loss).fold(f64::INFINITY, f64::min);
        prop_assert!((incumbents.records()[incumbents.len() - 1].loss() - best).abs() < f64::EPSILON);
    }

    // ========================================================================
    // Rescale Properties
    // ========================================================================

    /// Property: rescaling by c then 1/c reproduces the axis values
    #[test]
    fn prop_rescale_is_linear(trace in arb_flat_trace(), c in 0.01f64..100.0) {
        let back = trace
            .rescale_xaxis(Axis::Fidelity, c)
            .unwrap()
            .rescale_xaxis(Axis::Fidelity, 1.0 / c)
            .unwrap();

        let mut before: Vec<f64> = trace.iter().map(EvaluationRecord::fidelity).collect();
        before.sort_by(f64::total_cmp);
        let after: Vec<f64> = back.iter().map(EvaluationRecord::fidelity).collect();
        for (a, b) in after.iter().zip(&before) {
            prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
    }

    // ========================================================================
    // Ranking Properties
    // ========================================================================

    /// Property: each fully present row sums to k(k+1)/2
    #[test]
    fn prop_rank_rows_sum_to_triangular(bench in arb_benchmark()) {
        let ranks = bench.ranks(Axis::EndTime, Axis::Loss, 0, None).unwrap();

        for row in ranks.rows() {
            let present: Vec<f64> = row.iter().flatten().copied().collect();
            let k = present.len() as f64;
            let sum: f64 = present.iter().sum();
            prop_assert!((sum - k * (k + 1.0) / 2.0).abs() < 1e-9);
            for rank in &present {
                prop_assert!(*rank >= 1.0 && *rank <= k);
            }
        }
    }

    /// Property: once an algorithm has a value, it stays ranked
    #[test]
    fn prop_ranks_have_no_gaps_after_first_value(bench in arb_benchmark()) {
        let ranks = bench.ranks(Axis::EndTime, Axis::Loss, 0, None).unwrap();

        for name in ranks.columns() {
            let column = ranks.column(name).unwrap();
            let first = column.iter().position(Option::is_some);
            if let Some(first) = first {
                prop_assert!(column[first..].iter().all(Option::is_some));
            }
        }
    }
}
