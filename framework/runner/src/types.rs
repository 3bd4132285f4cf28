/// Recommended error type for a scenario `main` function and for the runner's own plumbing.
///
/// Errors that describe a single invocation are carried on its [ckpt_harness_summary_model::JobResult]
/// instead, so this is reserved for failures that stop a run.
pub type HarnessResult<T> = anyhow::Result<T>;
