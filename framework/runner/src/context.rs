use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use ckpt_harness_instruments::{extract_metrics, MetricMarker, ReportConfig, Reporter};
use ckpt_harness_summary_model::{JobResult, ResultSet, ResultStore};

use crate::definition::RunSettings;
use crate::executor::Executor;
use crate::invoker::ProcessInvoker;
use crate::shutdown::start_shutdown_listener;
use crate::types::HarnessResult;

/// State shared by every part of a single run: the runtime, the invoker and the results gathered
/// so far.
pub struct RunnerContext {
    executor: Executor,
    invoker: Arc<ProcessInvoker>,
    reporter: Reporter,
    markers: Vec<MetricMarker>,
    result_set: ResultSet,
}

impl RunnerContext {
    pub(crate) fn new(settings: &RunSettings) -> HarnessResult<Self> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        let shutdown_handle = start_shutdown_listener(&runtime)?;

        let invoker = ProcessInvoker::new()
            .with_timeout(settings.timeout)
            .with_shutdown(shutdown_handle.clone());
        let reporter = ReportConfig::default()
            .with_markers(settings.markers.clone())
            .enable_console()
            .enable_summary()
            .init();
        let result_set = ResultSet::new(
            settings.run_id.clone(),
            settings.name.clone(),
            chrono::Utc::now().timestamp(),
            env!("CARGO_PKG_VERSION").to_string(),
        );

        Ok(Self {
            executor: Executor::new(runtime, shutdown_handle),
            invoker: Arc::new(invoker),
            reporter,
            markers: settings.markers.clone(),
            result_set,
        })
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn invoker(&self) -> Arc<ProcessInvoker> {
        self.invoker.clone()
    }

    pub fn result_set(&self) -> &ResultSet {
        &self.result_set
    }

    /// Extract metrics from a finished job, report it and add it to the result set.
    pub fn record(&mut self, result: JobResult) {
        let metrics = extract_metrics(&result.raw_output, &self.markers);
        self.reporter.add_result(&result, &metrics);
        self.result_set.push(result, metrics);
    }

    /// Print the final reports and write the result set to `output`.
    pub(crate) fn finish(self, output: &Path) -> HarnessResult<ResultSet> {
        self.reporter.finalize();
        persist(&self.result_set, output)?;
        Ok(self.result_set)
    }
}

/// Store the results, falling back to the system temp directory so a run is never lost.
pub(crate) fn persist(result_set: &ResultSet, output: &Path) -> HarnessResult<()> {
    let error = match ResultStore::new(output).store(result_set) {
        Ok(()) => {
            log::info!(
                "Wrote {} results for run {} to {}",
                result_set.len(),
                result_set.run_id,
                output.display()
            );
            return Ok(());
        }
        Err(e) => e,
    };
    log::error!("{error}");

    let fallback = fallback_path(result_set);
    match ResultStore::new(&fallback).store(result_set) {
        Ok(()) => bail!(
            "Could not write results to {}, they were saved to {} instead: {error}",
            output.display(),
            fallback.display()
        ),
        Err(fallback_error) => bail!(
            "Could not write results to {} ({error}) or to {} ({fallback_error})",
            output.display(),
            fallback.display()
        ),
    }
}

fn fallback_path(result_set: &ResultSet) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}-{}.json",
        result_set.scenario_name, result_set.run_id
    ))
}
