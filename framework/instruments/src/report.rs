mod console_report;
mod summary_report;

use ckpt_harness_summary_model::{JobResult, Metric};

use crate::extract::{MetricMarker, EXECUTION_TIME};

pub use console_report::ConsoleReportCollector;
pub use summary_report::SummaryReportCollector;

pub trait ReportCollector {
    /// Record a finished job and the metrics that were extracted from it.
    fn add_result(&mut self, result: &JobResult, metrics: &[Metric]);

    /// Called once after the last job has been added.
    fn finalize(&self);
}

/// Choose which reporters are active for a run.
pub struct ReportConfig {
    markers: Vec<MetricMarker>,
    console: bool,
    summary: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            markers: vec![EXECUTION_TIME],
            console: false,
            summary: false,
        }
    }
}

impl ReportConfig {
    pub fn with_markers(mut self, markers: Vec<MetricMarker>) -> Self {
        self.markers = markers;
        self
    }

    /// Print each job and its metric lines as it is reported.
    pub fn enable_console(mut self) -> Self {
        self.console = true;
        self
    }

    /// Print a table of every job when the run is finalized.
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();
        if self.console {
            collectors.push(Box::new(ConsoleReportCollector::new(self.markers.clone())));
        }
        if self.summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }

        Reporter { collectors }
    }
}

/// Fans results out to every configured [ReportCollector].
pub struct Reporter {
    collectors: Vec<Box<dyn ReportCollector + Send>>,
}

impl Reporter {
    pub fn add_result(&mut self, result: &JobResult, metrics: &[Metric]) {
        for collector in &mut self.collectors {
            collector.add_result(result, metrics);
        }
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.finalize();
        }
    }
}
