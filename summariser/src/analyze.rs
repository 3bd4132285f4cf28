use ckpt_harness_instruments::{parse_seconds, EXECUTION_TIME};
use ckpt_harness_summary_model::{MetricValue, ResultEntry, ResultSet};
use itertools::Itertools;

use crate::model::{GroupSummary, StandardTimingsStats, SummaryOutput};

/// Summarise one run, grouping its jobs by program, target, variant and environment.
pub fn summarize_result_set(result_set: &ResultSet) -> SummaryOutput {
    let groups = result_set
        .entries
        .iter()
        .into_group_map_by(|entry| {
            let descriptor = &entry.result.descriptor;
            (
                descriptor.program().to_string(),
                descriptor.target_name().to_string(),
                descriptor.variant().to_string(),
                descriptor.environment().clone(),
            )
        })
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .map(|((program, target, variant, environment), entries)| {
            let times = entries
                .iter()
                .filter(|entry| entry.result.success())
                .filter_map(|entry| execution_time_s(entry))
                .collect::<Vec<_>>();

            GroupSummary {
                program,
                target,
                variant,
                environment,
                runs: entries.len(),
                failures: entries.iter().filter(|e| !e.result.success()).count(),
                execution_time_s: standard_timings_stats(&times),
            }
        })
        .collect();

    SummaryOutput {
        scenario_name: result_set.scenario_name.clone(),
        run_id: result_set.run_id.clone(),
        fingerprint: result_set.fingerprint(),
        started_at: result_set.started_at,
        jobs: result_set.len(),
        failures: result_set.failure_count(),
        groups,
    }
}

/// The execution time reported by a job, in seconds.
fn execution_time_s(entry: &ResultEntry) -> Option<f64> {
    let metric = entry
        .metrics
        .iter()
        .find(|metric| metric.name == EXECUTION_TIME.name)?;
    let MetricValue::Text(line) = &metric.value;
    parse_seconds(line, &metric.marker)
}

/// Mean, population standard deviation and range, or `None` for no samples.
pub fn standard_timings_stats(samples: &[f64]) -> Option<StandardTimingsStats> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    Some(StandardTimingsStats {
        mean,
        std: variance.sqrt(),
        min: samples.iter().copied().fold(f64::INFINITY, f64::min),
        max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        samples: samples.len(),
    })
}
