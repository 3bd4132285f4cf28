use ckpt_harness_summary_model::{JobResult, Metric};
use tabled::Tabled;

#[derive(Tabled)]
pub struct JobRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub target: String,
    pub variant: String,
    #[tabled(skip)]
    pub ok: bool,
    pub status: String,
    pub elapsed_ms: u64,
    pub metric: String,
}

impl JobRow {
    pub fn new(index: usize, result: &JobResult, metrics: &[Metric]) -> Self {
        Self {
            index,
            target: result.descriptor.target_name().to_string(),
            variant: result.descriptor.variant().to_string(),
            ok: result.success(),
            status: result.exit_status.to_string(),
            elapsed_ms: result.elapsed_ms,
            metric: metrics
                .first()
                .map(|metric| metric.value.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}
