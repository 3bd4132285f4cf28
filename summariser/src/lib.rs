use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ckpt_harness_instruments::{ReportConfig, EXECUTION_TIME};
use ckpt_harness_summary_model::{ResultSet, ResultStore};

use crate::model::SummaryOutput;

mod analyze;
pub mod filter;
pub mod model;
mod table;

pub use analyze::{standard_timings_stats, summarize_result_set};
pub use table::render_summary_table;

/// Load every result file, returning the ones that loaded and an error for each that did not.
pub fn load_result_sets(paths: &[PathBuf]) -> (Vec<ResultSet>, Vec<anyhow::Error>) {
    let mut result_sets = Vec::new();
    let mut errors = Vec::new();

    for path in paths {
        log::debug!("Loading results from {}", path.display());
        match ResultStore::new(path).load() {
            Ok(result_set) => result_sets.push(result_set),
            Err(e) => errors.push(anyhow::Error::new(e)),
        }
    }

    (result_sets, errors)
}

/// Print each job's command line and execution time lines.
pub fn print_job_lines(result_set: &ResultSet) {
    let mut reporter = ReportConfig::default()
        .with_markers(vec![EXECUTION_TIME])
        .enable_console()
        .init();
    for entry in &result_set.entries {
        reporter.add_result(&entry.result, &entry.metrics);
    }
}

/// Write the summaries as pretty JSON to a new, timestamped file in `dir`.
pub fn write_report(dir: &Path, outputs: &[SummaryOutput]) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!(
        "summariser-report-{}.json",
        chrono::Utc::now().format("%Y-%m-%dT%H.%M.%S%.fZ")
    ));
    let report = File::create_new(&path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    serde_json::to_writer_pretty(report, outputs)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;

    Ok(path)
}
