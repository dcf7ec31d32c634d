//! Integration tests for raw result loading and benchmark metadata
//!
//! Fixtures are written into a `tempfile::TempDir` per test.

mod common;

use hpo_traces::executor::Sequential;
use hpo_traces::load::{discover, load_trace, SourceFormat};
use hpo_traces::{AlgorithmResults, Axis, Benchmark, BenchmarkResults, Error, EvaluationRecord};
use tempfile::TempDir;

// ============================================================================
// Format A (neps)
// ============================================================================

#[test]
fn test_neps_trace_is_sorted_with_relative_times() {
    let dir = TempDir::new().unwrap();
    common::write_neps(
        dir.path(),
        &[
            ("config_2_0", 0.5, 1.0, 105.0, 108.0),
            ("config_1_0", 0.7, 1.0, 100.0, 102.0),
            ("config_1_1", 0.4, 3.0, 102.0, 110.0),
        ],
    );

    assert_eq!(SourceFormat::detect(dir.path()).unwrap(), SourceFormat::Neps);
    let trace = load_trace(dir.path()).unwrap();

    let keys: Vec<String> = trace.iter().map(|r| r.key().to_string()).collect();
    assert_eq!(keys, vec!["1_0", "2_0", "1_1"]);

    let first = &trace.records()[0];
    assert_eq!(first.start_time_since_global_start(), Some(0.0));
    assert_eq!(first.end_time_since_global_start(), Some(2.0));
    assert!((first.cost() - 2.0).abs() < f64::EPSILON);
    assert!((first.val_score() - 0.3).abs() < 1e-12);
    assert_eq!(first.process_id(), None);
}

#[test]
fn test_neps_without_brackets() {
    let dir = TempDir::new().unwrap();
    common::write_neps(dir.path(), &[("config_7", 0.5, 1.0, 0.0, 1.0)]);

    let trace = load_trace(dir.path()).unwrap();
    assert_eq!(trace.records()[0].id(), 7);
    assert_eq!(trace.records()[0].bracket(), None);
}

#[test]
fn test_neps_empty_results_is_missing_data() {
    let dir = TempDir::new().unwrap();
    common::write_neps(dir.path(), &[]);

    let err = load_trace(dir.path()).unwrap_err();
    assert!(matches!(err, Error::MissingData { .. }));
}

#[test]
fn test_neps_malformed_descriptor() {
    let dir = TempDir::new().unwrap();
    let config = dir
        .path()
        .join("neps_root_directory")
        .join("results")
        .join("config_1");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(config.join("result.yaml"), "loss: [not, a, number]\n").unwrap();

    assert!(matches!(load_trace(dir.path()), Err(Error::Yaml(_))));
}

#[test]
fn test_unknown_layout_is_format_error() {
    let dir = TempDir::new().unwrap();
    let err = load_trace(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert!(err.to_string().contains("neps_root_directory"));
}

// ============================================================================
// Format B (hpbandster)
// ============================================================================

#[test]
fn test_hpbandster_ids_and_brackets() {
    let dir = TempDir::new().unwrap();
    common::write_hpbandster(
        dir.path(),
        &[[0, 0, 5], [0, 0, 2]],
        &[
            ([0, 0, 5], 1.0, 0.5, 10.0, 11.0),
            ([0, 0, 2], 1.9, 0.4, 11.0, 12.0),
            ([0, 0, 5], 9.0, 0.3, 12.0, 14.0),
        ],
    );

    assert_eq!(
        SourceFormat::detect(dir.path()).unwrap(),
        SourceFormat::Hpbandster
    );
    let trace = load_trace(dir.path()).unwrap();

    // Opaque ids remapped in first-seen order of configs.json
    let ids: Vec<u64> = trace.iter().map(EvaluationRecord::id).collect();
    assert_eq!(ids, vec![0, 1, 0]);

    // Budgets truncate to {1, 9} -> brackets 0 and 1
    let fidelities: Vec<f64> = trace.iter().map(EvaluationRecord::fidelity).collect();
    assert_eq!(fidelities, vec![1.0, 1.0, 9.0]);
    let brackets: Vec<Option<u32>> = trace.iter().map(EvaluationRecord::bracket).collect();
    assert_eq!(brackets, vec![Some(0), Some(0), Some(1)]);

    assert_eq!(trace.records()[2].end_time_since_global_start(), Some(4.0));
}

#[test]
fn test_hpbandster_stitches_like_neps() {
    let dir = TempDir::new().unwrap();
    common::write_hpbandster(
        dir.path(),
        &[[0, 0, 0]],
        &[
            ([0, 0, 0], 3.0, 0.5, 0.0, 1.0),
            ([0, 0, 0], 9.0, 0.3, 1.0, 2.0),
        ],
    );

    let stitched = load_trace(dir.path()).unwrap().with_continuations().unwrap();
    let fidelities: Vec<f64> = stitched.iter().map(EvaluationRecord::fidelity).collect();
    assert_eq!(fidelities, vec![3.0, 6.0]);
}

#[test]
fn test_hpbandster_unknown_config_id() {
    let dir = TempDir::new().unwrap();
    common::write_hpbandster(dir.path(), &[[0, 0, 0]], &[([9, 9, 9], 1.0, 0.5, 0.0, 1.0)]);

    assert!(matches!(load_trace(dir.path()), Err(Error::NotFound(_))));
}

#[test]
fn test_hpbandster_empty_results_is_missing_data() {
    let dir = TempDir::new().unwrap();
    common::write_hpbandster(dir.path(), &[[0, 0, 0]], &[]);

    assert!(matches!(
        load_trace(dir.path()),
        Err(Error::MissingData { .. })
    ));
}

// ============================================================================
// Directory layout
// ============================================================================

#[test]
fn test_algorithm_results_discovers_seeds() {
    let dir = TempDir::new().unwrap();
    let results = dir.path();
    for seed in [3, 1] {
        common::write_neps(
            &common::seed_dir(results, "b", "rs", seed),
            &[("config_1", 0.5, 1.0, 0.0, 1.0)],
        );
    }
    let algo_dir = results.join("benchmark=b").join("algorithm=rs");

    let all = AlgorithmResults::load(&algo_dir, None).unwrap();
    assert_eq!(all.seeds().into_iter().collect::<Vec<_>>(), vec![1, 3]);

    let one = AlgorithmResults::load(&algo_dir, Some(&[3][..])).unwrap();
    assert_eq!(one.len(), 1);

    assert!(AlgorithmResults::load(&algo_dir, Some(&[8][..])).is_err());
}

#[test]
fn test_benchmark_results_discovers_algorithms() {
    let dir = TempDir::new().unwrap();
    for algo in ["hyperband", "random_search"] {
        common::write_neps(
            &common::seed_dir(dir.path(), "b", algo, 0),
            &[("config_1", 0.5, 1.0, 0.0, 1.0)],
        );
    }
    let bench_dir = dir.path().join("benchmark=b");

    assert_eq!(
        discover(&bench_dir, "algorithm").unwrap(),
        vec!["hyperband".to_string(), "random_search".to_string()]
    );

    let bench = BenchmarkResults::load(&bench_dir, None, None, &Sequential).unwrap();
    assert_eq!(bench.len(), 2);
    assert_eq!(bench.indices(Axis::EndTime).unwrap(), vec![1.0]);
    assert_eq!(bench.iter_records().count(), 2);
}

// ============================================================================
// Benchmark metadata
// ============================================================================

#[test]
fn test_benchmark_from_name() {
    let dir = TempDir::new().unwrap();
    common::write_benchmark_config(dir.path(), "lcbench-189862", 52.0);

    let bench = Benchmark::from_name("lcbench-189862", dir.path()).unwrap();
    assert_eq!(bench.name(), "lcbench-189862");
    assert_eq!(bench.basename(), "lcbench-189862-base");
    assert_eq!(bench.prior(), Some("good"));
    assert_eq!(bench.task_id(), Some("189862"));
    assert_eq!(bench.epsilon(), None);
    assert_eq!(bench.optimum(), Some(0.05));
    assert_eq!(bench.best_errors().best_10, Some(0.2));
    assert_eq!(bench.best_errors().best_25, None);
    assert!((bench.max_fidelity() - 52.0).abs() < f64::EPSILON);
    assert_eq!(bench.config_path(), dir.path().join("lcbench-189862.yaml"));
}

#[test]
fn test_benchmark_missing_max_fidelity() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("b.yaml"), "api:\n  name: b\n").unwrap();

    assert!(matches!(
        Benchmark::from_name("b", dir.path()),
        Err(Error::Yaml(_))
    ));
}
