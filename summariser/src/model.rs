use ckpt_harness_summary_model::EnvironmentConfig;
use serde::{Deserialize, Serialize};

/// The summary of one stored run, as written to the summariser report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryOutput {
    pub scenario_name: String,
    pub run_id: String,
    pub fingerprint: String,
    pub started_at: i64,
    pub jobs: usize,
    pub failures: usize,
    pub groups: Vec<GroupSummary>,
}

/// Every job of a run that shares a program, target, variant and environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSummary {
    pub program: String,
    pub target: String,
    pub variant: String,
    pub environment: EnvironmentConfig,
    pub runs: usize,
    pub failures: usize,
    /// Execution time of the successful runs in seconds, absent when none reported one.
    pub execution_time_s: Option<StandardTimingsStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardTimingsStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}
