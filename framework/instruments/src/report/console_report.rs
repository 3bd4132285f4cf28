use ckpt_harness_summary_model::{JobResult, Metric};

use crate::extract::{extract_marker_lines, MetricMarker};
use crate::report::ReportCollector;

/// Prints the command of each job followed by every line that matched a marker.
///
/// A job that did not succeed also gets its status printed, so a missing metric line is never
/// the only sign of a failure.
pub struct ConsoleReportCollector {
    markers: Vec<MetricMarker>,
}

impl ConsoleReportCollector {
    pub fn new(markers: Vec<MetricMarker>) -> Self {
        Self { markers }
    }

    pub(crate) fn render(&self, result: &JobResult) -> String {
        let mut out = result.descriptor.command_line();
        for marker in &self.markers {
            for line in extract_marker_lines(&result.raw_output, marker.marker) {
                out.push('\n');
                out.push_str(line);
            }
        }
        if !result.success() {
            out.push_str(&format!("\n  [{}]", result.exit_status));
        }
        if result.output_truncated {
            out.push_str("\n  [output incomplete]");
        }
        out
    }
}

impl ReportCollector for ConsoleReportCollector {
    fn add_result(&mut self, result: &JobResult, _metrics: &[Metric]) {
        println!("{}", self.render(result));
    }

    fn finalize(&self) {}
}
