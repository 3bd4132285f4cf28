mod extract;
mod report;

pub use extract::{
    extract_marker_lines, extract_metrics, parse_seconds, MetricMarker, EXECUTION_TIME,
};
pub use report::{
    ConsoleReportCollector, ReportCollector, ReportConfig, Reporter, SummaryReportCollector,
};
