//! On-disk result fixtures shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One neps evaluation: `(config dir name, loss, fidelity, start, end)`.
pub type NepsEval<'a> = (&'a str, f64, f64, f64, f64);

/// Write a neps-style seed directory under `seed_dir`.
pub fn write_neps(seed_dir: &Path, evals: &[NepsEval<'_>]) {
    let results = seed_dir.join("neps_root_directory").join("results");
    fs::create_dir_all(&results).unwrap();
    for &(name, loss, fidelity, start, end) in evals {
        let dir = results.join(name);
        fs::create_dir_all(&dir).unwrap();
        let yaml = format!(
            "loss: {loss:?}\n\
             cost: {cost:?}\n\
             info_dict:\n  \
               val_score: {val:?}\n  \
               test_score: {test:?}\n  \
               fidelity: {fidelity:?}\n  \
               start_time: {start:?}\n  \
               end_time: {end:?}\n  \
               max_fidelity_loss: 0.1\n  \
               max_fidelity_cost: 100.0\n",
            cost = fidelity * 2.0,
            val = 1.0 - loss,
            test = 1.0 - loss,
        );
        fs::write(dir.join("result.yaml"), yaml).unwrap();
    }
}

/// One hpbandster evaluation: `(opaque id, budget, loss, started, finished)`.
pub type HpEval = ([i64; 3], f64, f64, f64, f64);

/// Write an hpbandster-style seed directory under `seed_dir`.
pub fn write_hpbandster(seed_dir: &Path, configs: &[[i64; 3]], evals: &[HpEval]) {
    let root = seed_dir.join("hpbandster_root_directory");
    fs::create_dir_all(&root).unwrap();

    let configs_json: String = configs
        .iter()
        .map(|id| format!("[{id:?}, {{\"x\": 0.5}}, {{}}]\n"))
        .collect();
    fs::write(root.join("configs.json"), configs_json).unwrap();

    let results_json: String = evals
        .iter()
        .map(|(id, budget, loss, started, finished)| {
            format!(
                "[{id:?}, {budget:?}, {{\"submitted\": 0.0, \"started\": {started:?}, \"finished\": {finished:?}}}, \
                 {{\"loss\": {loss:?}, \"cost\": {budget:?}, \"info\": {{\"val_score\": 0.5, \"test_score\": 0.5, \
                 \"max_fidelity_loss\": 0.1, \"max_fidelity_cost\": 9.0}}}}, null]\n"
            )
        })
        .collect();
    fs::write(root.join("results.json"), results_json).unwrap();
}

/// Write `{config_dir}/{name}.yaml` with the given maximum fidelity.
pub fn write_benchmark_config(config_dir: &Path, name: &str, max_fidelity: f64) {
    fs::create_dir_all(config_dir).unwrap();
    let yaml = format!(
        "api:\n  name: {name}-base\n  prior: good\n  task_id: \"189862\"\n\
         max_fidelity: {max_fidelity:?}\n\
         optimum: 0.05\n\
         best_10_error: 0.2\n\
         best_100_error: 0.05\n"
    );
    fs::write(config_dir.join(format!("{name}.yaml")), yaml).unwrap();
}

/// `{results}/benchmark={b}/algorithm={a}/seed={s}`
pub fn seed_dir(results: &Path, benchmark: &str, algorithm: &str, seed: u32) -> PathBuf {
    results
        .join(format!("benchmark={benchmark}"))
        .join(format!("algorithm={algorithm}"))
        .join(format!("seed={seed}"))
}

/// A small experiment group at `{base}/results/{group}` with two algorithms,
/// two seeds and metadata under `{base}/configs/benchmark`.
pub fn write_experiment(base: &Path, group: &str) {
    let results = base.join("results").join(group);
    for seed in 0..2u32 {
        let offset = f64::from(seed) * 100.0;
        write_neps(
            &seed_dir(&results, "bench", "good", seed),
            &[
                ("config_1_0", 0.6, 10.0, offset, offset + 1.0),
                ("config_1_1", 0.3, 30.0, offset + 1.0, offset + 3.0),
                ("config_2_0", 0.5, 10.0, offset + 3.0, offset + 4.0),
            ],
        );
        write_neps(
            &seed_dir(&results, "bench", "slow", seed),
            &[
                ("config_1", 0.8, 50.0, offset, offset + 2.0),
                ("config_2", 0.4, 50.0, offset + 2.0, offset + 4.0),
            ],
        );
    }
    write_benchmark_config(&base.join("configs").join("benchmark"), "bench", 50.0);
}
