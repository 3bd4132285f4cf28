use ckpt_harness_core::prelude::{ShutdownHandle, ShutdownSignalError};
use ckpt_harness_summary_model::ResultSet;

use crate::context::RunnerContext;
use crate::definition::{BenchmarkDefinitionBuilder, ScenarioDefinitionBuilder};
use crate::dispatcher::ParallelDispatcher;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::sequencer::ScenarioSequencer;
use crate::types::HarnessResult;

/// Run every job of the benchmark matrix on a bounded pool, then report and store the results.
///
/// Failed jobs are recorded and do not fail the run. A failure to store the results does, and so
/// does an interrupt, after whatever finished has been stored.
pub fn run_benchmark(definition: BenchmarkDefinitionBuilder) -> HarnessResult<ResultSet> {
    let definition = definition.build()?;
    let settings = definition.settings;

    log::info!(
        "Running benchmark {} with run id {}",
        settings.name,
        settings.run_id
    );

    let descriptors = definition.matrix.generate();
    if descriptors.is_empty() {
        log::warn!("The job matrix is empty, there is nothing to run");
    }

    let mut runner_context = RunnerContext::new(&settings)?;

    let progress = start_progress(descriptors.len(), settings.no_progress);
    let dispatcher = ParallelDispatcher::new(settings.pool_size).with_progress(progress.clone());

    // Report high host load while jobs run, since it would skew their timings.
    let monitor_stop = ShutdownHandle::new();
    start_monitor(monitor_stop.new_listener());

    let results = runner_context
        .executor()
        .execute_in_place(dispatcher.dispatch(runner_context.invoker(), descriptors));

    monitor_stop.shutdown();
    progress.finish_and_clear();

    for result in results {
        runner_context.record(result);
    }

    let shutdown_handle = runner_context.executor().shutdown_handle().clone();
    let result_set = runner_context.finish(&settings.output)?;
    check_interrupted(&shutdown_handle)?;

    log::info!(
        "Benchmark finished: {} jobs, {} failed",
        result_set.len(),
        result_set.failure_count()
    );

    Ok(result_set)
}

/// Run the scenario's steps in order, then report and store the results.
///
/// The results of the steps that ran are stored even if the scenario was aborted or interrupted,
/// in which case the abort or the [ShutdownSignalError] is returned as the error.
pub fn run_scenario(definition: ScenarioDefinitionBuilder) -> HarnessResult<ResultSet> {
    let definition = definition.build()?;
    let settings = definition.settings;

    log::info!(
        "Running scenario {} with run id {} ({} steps)",
        settings.name,
        settings.run_id,
        definition.steps.len()
    );

    let mut runner_context = RunnerContext::new(&settings)?;

    let sequencer = ScenarioSequencer::new(runner_context.invoker())
        .with_startup_grace(definition.startup_grace)
        .with_teardown(definition.teardown);
    let run = runner_context
        .executor()
        .execute_in_place(sequencer.run(definition.steps));

    let failures = run.failure_count();
    for record in run.records {
        runner_context.record(record.result);
    }

    let shutdown_handle = runner_context.executor().shutdown_handle().clone();
    let result_set = runner_context.finish(&settings.output)?;
    check_interrupted(&shutdown_handle)?;

    if let Some(abort) = run.aborted {
        return Err(abort.into());
    }

    log::info!(
        "Scenario finished: {} steps, {failures} failed",
        result_set.len()
    );

    Ok(result_set)
}

fn check_interrupted(shutdown_handle: &ShutdownHandle) -> HarnessResult<()> {
    if shutdown_handle.is_shutdown() {
        log::warn!("Run was interrupted, unfinished jobs are recorded as cancelled");
        return Err(ShutdownSignalError::default().into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninterrupted_run_is_ok() {
        assert!(check_interrupted(&ShutdownHandle::new()).is_ok());
    }

    #[test]
    fn interrupted_run_returns_shutdown_error() {
        let shutdown_handle = ShutdownHandle::new();
        shutdown_handle.shutdown();

        let err = check_interrupted(&shutdown_handle).unwrap_err();
        assert!(err.is::<ShutdownSignalError>());
    }
}
