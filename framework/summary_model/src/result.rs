use std::fmt::{Display, Formatter};
use std::time::Duration;

use ckpt_harness_core::prelude::HarnessError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;

use crate::ScenarioDescriptor;

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitStatus {
    /// The process ran to completion. The code is missing if it was terminated by a signal.
    Exited { code: Option<i32> },
    /// The process could not be started at all.
    LaunchFailed { reason: String },
    /// The process exceeded its allowed duration and was killed.
    TimedOut { after_ms: u64 },
    /// The harness was asked to shut down while the job was queued or running.
    Cancelled,
    /// Started as a background process that is still owned by the scenario.
    Backgrounded { pid: Option<u32> },
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(
            self,
            ExitStatus::Exited { code: Some(0) } | ExitStatus::Backgrounded { .. }
        )
    }

    /// Convert a failed status into the matching [HarnessError], or `None` on success.
    pub fn to_error(&self, program: &str) -> Option<HarnessError> {
        let program = program.to_string();
        match self {
            ExitStatus::Exited { code: Some(0) } | ExitStatus::Backgrounded { .. } => None,
            ExitStatus::Exited { code } => Some(HarnessError::NonZeroExit {
                program,
                code: *code,
            }),
            ExitStatus::LaunchFailed { reason } => Some(HarnessError::LaunchFailure {
                program,
                reason: reason.clone(),
            }),
            ExitStatus::TimedOut { after_ms } => Some(HarnessError::Timeout {
                program,
                after: Duration::from_millis(*after_ms),
            }),
            ExitStatus::Cancelled => Some(HarnessError::Cancelled { program }),
        }
    }
}

impl Display for ExitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Exited { code: Some(code) } => write!(f, "exit code {code}"),
            ExitStatus::Exited { code: None } => write!(f, "terminated by signal"),
            ExitStatus::LaunchFailed { reason } => write!(f, "launch failed: {reason}"),
            ExitStatus::TimedOut { after_ms } => write!(f, "timed out after {after_ms}ms"),
            ExitStatus::Cancelled => write!(f, "cancelled"),
            ExitStatus::Backgrounded { pid: Some(pid) } => write!(f, "running in background (pid {pid})"),
            ExitStatus::Backgrounded { pid: None } => write!(f, "running in background"),
        }
    }
}

/// The raw outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub descriptor: ScenarioDescriptor,
    /// Everything the process wrote to stdout, followed by everything it wrote to stderr.
    pub raw_output: String,
    pub exit_status: ExitStatus,
    pub elapsed_ms: u64,
    /// Set when a pipe was still open after the process ended and reading was given up, so
    /// `raw_output` holds only what was read until then.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub output_truncated: bool,
}

impl JobResult {
    pub fn new(
        descriptor: ScenarioDescriptor,
        raw_output: String,
        exit_status: ExitStatus,
        elapsed: Duration,
    ) -> Self {
        Self {
            descriptor,
            raw_output,
            exit_status,
            elapsed_ms: elapsed.as_millis() as u64,
            output_truncated: false,
        }
    }

    pub fn with_truncated_output(mut self) -> Self {
        self.output_truncated = true;
        self
    }

    /// A result for a job that never produced any output.
    pub fn without_output(descriptor: ScenarioDescriptor, exit_status: ExitStatus) -> Self {
        Self::new(descriptor, String::new(), exit_status, Duration::ZERO)
    }

    pub fn success(&self) -> bool {
        self.exit_status.success()
    }

    pub fn check(&self) -> Result<(), HarnessError> {
        match self.exit_status.to_error(self.descriptor.program()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// The matched line as it appeared in the output. Interpretation, such as parsing a duration,
/// is left to the consumer so the stored file keeps the tool's own wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Text(String),
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

/// A value extracted from a job's output by matching a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub marker: String,
    pub value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub result: JobResult,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

/// Every job of one run, in the order the jobs were submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Chosen by the runner, unique for each run.
    pub run_id: String,
    pub scenario_name: String,
    /// Unix timestamp in seconds.
    pub started_at: i64,
    pub harness_version: String,
    pub entries: Vec<ResultEntry>,
}

impl ResultSet {
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        harness_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            harness_version,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, result: JobResult, metrics: Vec<Metric>) {
        self.entries.push(ResultEntry { result, metrics });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.result.success())
            .count()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ScenarioDescriptor> {
        self.entries.iter().map(|entry| &entry.result.descriptor)
    }

    /// Compute a fingerprint for the configuration that produced this result set.
    ///
    /// Two runs of the same scenario over the same set of invocations share a fingerprint,
    /// regardless of the order the jobs were listed in. It uses the
    ///     - Scenario name
    ///     - Program, target, variant, environment and arguments of every job
    ///     - Harness version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        self.descriptors()
            .sorted_by_key(|descriptor| descriptor.command_line())
            .for_each(|descriptor| {
                Digest::update(&mut hasher, descriptor.program().as_bytes());
                Digest::update(&mut hasher, descriptor.target_name().as_bytes());
                Digest::update(&mut hasher, descriptor.variant().as_bytes());
                descriptor.environment().iter().for_each(|(k, v)| {
                    Digest::update(&mut hasher, k.as_bytes());
                    Digest::update(&mut hasher, v.as_bytes());
                });
                descriptor.args().iter().for_each(|arg| {
                    Digest::update(&mut hasher, arg.as_bytes());
                });
            });
        Digest::update(&mut hasher, self.harness_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_set(targets: &[&str]) -> ResultSet {
        let mut set = ResultSet::new(
            "run".to_string(),
            "bench_nas".to_string(),
            1_700_000_000,
            "0.1.0".to_string(),
        );
        for target in targets {
            set.push(
                JobResult::without_output(
                    ScenarioDescriptor::new("ckpt", *target),
                    ExitStatus::Exited { code: Some(0) },
                ),
                vec![],
            );
        }
        set
    }

    #[test]
    fn fingerprint_ignores_job_order() {
        assert_eq!(
            result_set(&["bt", "cg"]).fingerprint(),
            result_set(&["cg", "bt"]).fingerprint()
        );
    }

    #[test]
    fn fingerprint_changes_with_jobs() {
        assert_ne!(
            result_set(&["bt", "cg"]).fingerprint(),
            result_set(&["bt"]).fingerprint()
        );
    }

    #[test]
    fn fingerprint_ignores_run_id() {
        let mut other = result_set(&["bt"]);
        other.run_id = "another".to_string();
        assert_eq!(result_set(&["bt"]).fingerprint(), other.fingerprint());
    }

    #[test]
    fn status_to_error_kinds() {
        assert!(ExitStatus::Exited { code: Some(0) }.to_error("x").is_none());
        assert!(ExitStatus::Backgrounded { pid: None }.to_error("x").is_none());
        assert_eq!(
            ExitStatus::Exited { code: Some(2) }.to_error("x").unwrap().kind(),
            "non_zero_exit"
        );
        assert_eq!(
            ExitStatus::TimedOut { after_ms: 5 }.to_error("x").unwrap().kind(),
            "timeout"
        );
        assert_eq!(
            ExitStatus::LaunchFailed {
                reason: "not found".to_string()
            }
            .to_error("x")
            .unwrap()
            .kind(),
            "launch_failure"
        );
    }

    #[test]
    fn failure_count_counts_unsuccessful_jobs() {
        let mut set = result_set(&["bt"]);
        set.push(
            JobResult::without_output(
                ScenarioDescriptor::new("ckpt", "cg"),
                ExitStatus::Exited { code: Some(1) },
            ),
            vec![],
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.failure_count(), 1);
    }

    #[test]
    fn truncated_output_flag_is_stored_only_when_set() {
        let result = JobResult::without_output(
            ScenarioDescriptor::new("ckpt", "bt"),
            ExitStatus::Exited { code: Some(0) },
        );
        let complete = serde_json::to_value(&result).unwrap();
        assert!(complete.get("output_truncated").is_none());

        let truncated = serde_json::to_value(result.with_truncated_output()).unwrap();
        assert_eq!(truncated["output_truncated"], serde_json::json!(true));

        // Files written before the flag existed still load.
        let loaded: JobResult = serde_json::from_value(complete).unwrap();
        assert!(!loaded.output_truncated);
    }

    #[test]
    fn metric_value_is_stored_as_the_matched_line() {
        let metric = Metric {
            name: "execution_time".to_string(),
            marker: "Execution time:".to_string(),
            value: MetricValue::Text("Execution time: 1.5s".to_string()),
        };
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["value"], serde_json::json!("Execution time: 1.5s"));
        assert_eq!(serde_json::from_value::<Metric>(json).unwrap(), metric);

        assert!(serde_json::from_value::<MetricValue>(serde_json::Value::Null).is_err());
    }
}
