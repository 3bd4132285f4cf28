mod jobs_table;

use ckpt_harness_summary_model::{JobResult, Metric};
use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_report::jobs_table::JobRow;
use crate::report::ReportCollector;

/// Collects a row per job and prints them as a table when the run is finalized.
#[derive(Default)]
pub struct SummaryReportCollector {
    rows: Vec<JobRow>,
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn print_summary_of_jobs(&self) {
        let failed = self.rows.iter().filter(|row| !row.ok).count();
        println!(
            "\nSummary of jobs ({} total, {} failed)",
            self.rows.len(),
            failed
        );

        let mut table = Table::new(&self.rows);
        table.with(Style::modern());

        println!("{}", table);
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_result(&mut self, result: &JobResult, metrics: &[Metric]) {
        self.rows.push(JobRow::new(self.rows.len(), result, metrics));
    }

    fn finalize(&self) {
        self.print_summary_of_jobs();
    }
}
