use std::path::{Path, PathBuf};

use anyhow::anyhow;
use ckpt_harness_summariser::{
    filter, load_result_sets, print_job_lines, render_summary_table, summarize_result_set,
    write_report,
};
use clap::Parser;

/// Default result file, written by the benchmark matrix binary.
const DEFAULT_RESULTS_PATH: &str = "bench_nas_results.json";

/// Summarise stored checkpoint harness results.
#[derive(Parser)]
#[command(about, long_about = None)]
struct SummariserCli {
    /// Result files to summarise.
    #[arg(env = "RESULTS_PATH", value_delimiter = ',', default_value = DEFAULT_RESULTS_PATH)]
    files: Vec<PathBuf>,

    /// Log result files that fail to load instead of failing.
    #[arg(long, env = "IGNORE_SUMMARY_ERRORS")]
    ignore_errors: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = SummariserCli::parse();

    let (result_sets, errors) = load_result_sets(&cli.files);
    for result_set in &result_sets {
        println!(
            "== {} (run {}, {} jobs)",
            result_set.scenario_name,
            result_set.run_id,
            result_set.len()
        );
        print_job_lines(result_set);
    }

    let latest = filter::latest_result_sets_by_name_and_config(result_sets);
    for (name, fingerprint, result_set) in &latest {
        log::debug!(
            "Selected run {} for {name} ({fingerprint})",
            result_set.run_id
        );
    }

    let summary_outputs = latest
        .iter()
        .map(|(_, _, result_set)| summarize_result_set(result_set))
        .collect::<Vec<_>>();

    if !summary_outputs.is_empty() {
        println!("\n{}", render_summary_table(&summary_outputs));
    }

    let report = write_report(Path::new("."), &summary_outputs)?;
    log::info!("Wrote summary report to {}", report.display());

    // If any file failed and errors should not explicitly be ignored, return an error
    if !errors.is_empty() {
        let error_message = format!(
            "{} out of {} result files failed to load:\n{:#?}",
            errors.len(),
            cli.files.len(),
            errors
        );

        if cli.ignore_errors {
            log::warn!("{}", error_message);
        } else {
            return Err(anyhow!(error_message));
        }
    }

    Ok(())
}
