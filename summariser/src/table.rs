use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::model::{GroupSummary, SummaryOutput};

#[derive(Tabled)]
struct GroupRow {
    scenario: String,
    program: String,
    target: String,
    variant: String,
    environment: String,
    runs: usize,
    failures: usize,
    #[tabled(rename = "mean (s)")]
    mean: String,
    #[tabled(rename = "std (s)")]
    std: String,
    #[tabled(rename = "min (s)")]
    min: String,
    #[tabled(rename = "max (s)")]
    max: String,
}

impl GroupRow {
    fn new(scenario: &str, group: &GroupSummary) -> Self {
        let stat = |f: fn(&crate::model::StandardTimingsStats) -> f64| {
            group
                .execution_time_s
                .as_ref()
                .map(|stats| format!("{:.3}", f(stats)))
                .unwrap_or_else(|| "-".to_string())
        };

        Self {
            scenario: scenario.to_string(),
            program: group.program.clone(),
            target: group.target.clone(),
            variant: group.variant.clone(),
            environment: group
                .environment
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" "),
            runs: group.runs,
            failures: group.failures,
            mean: stat(|s| s.mean),
            std: stat(|s| s.std),
            min: stat(|s| s.min),
            max: stat(|s| s.max),
        }
    }
}

/// Render every group of every summary as one table.
pub fn render_summary_table(outputs: &[SummaryOutput]) -> String {
    let rows = outputs
        .iter()
        .flat_map(|output| {
            output
                .groups
                .iter()
                .map(|group| GroupRow::new(&output.scenario_name, group))
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}
