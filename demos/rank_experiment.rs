//! Rank an experiment group
//!
//! Loads `{base}/results/{group}`, applies the default transform pipeline and
//! prints the mean rank (with standard error) of every algorithm. Optionally
//! writes the mean-rank table to Parquet.
//!
//! Run with:
//! cargo run --example rank_experiment -- <base_path> <group> [fetch.yaml] [out.parquet]
//!
//! Set `RUST_LOG=hpo_traces=debug` to follow per-trace progress.

use anyhow::{bail, Context};
use hpo_traces::executor::Sequential;
use hpo_traces::pipeline::{fetch_results, FetchConfig};
use hpo_traces::storage::write_parquet;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (base, group) = match args.as_slice() {
        [base, group, ..] => (base.clone(), group.clone()),
        _ => bail!("usage: rank_experiment <base_path> <group> [fetch.yaml] [out.parquet]"),
    };

    let config = match args.get(2) {
        Some(path) => {
            let mut config = FetchConfig::from_yaml_file(path)
                .with_context(|| format!("reading fetch config {path}"))?;
            config.experiment_group = group;
            config.base_path = base.into();
            config
        }
        None => FetchConfig::builder(group, base).build(),
    };

    println!("=== hpo-traces: {} ===\n", config.experiment_group);

    let experiment = fetch_results(&config).context("fetching results")?;
    println!("Benchmarks: {}", experiment.benchmarks().len());
    println!("Algorithms: {}", experiment.algorithms().join(", "));
    println!("Seeds:      {:?}\n", experiment.seeds());

    let summary = experiment
        .ranks(config.xaxis, config.incumbent_value, &Sequential)
        .context("ranking algorithms")?;

    // Final row: rank after the whole budget
    let Some(last) = summary.means.num_rows().checked_sub(1) else {
        bail!("experiment has no evaluations to rank");
    };
    println!("Final mean rank at {} = {:.3}:", config.xaxis, summary.means.index()[last]);
    for (j, name) in summary.means.columns().iter().enumerate() {
        let mean = summary.means.rows()[last][j];
        let sem = summary.standard_errors.rows()[last][j];
        match (mean, sem) {
            (Some(mean), Some(sem)) => println!("  {name:<24} {mean:.3} ± {sem:.3}"),
            (Some(mean), None) => println!("  {name:<24} {mean:.3}"),
            _ => println!("  {name:<24} -"),
        }
    }

    if let Some(out) = args.get(3) {
        let batch = summary.means.to_record_batch(config.xaxis.as_str())?;
        write_parquet(&batch, out).with_context(|| format!("writing {out}"))?;
        println!("\nWrote mean ranks to {out}");
    }

    Ok(())
}
