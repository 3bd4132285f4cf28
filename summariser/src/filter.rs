use ckpt_harness_summary_model::ResultSet;
use itertools::Itertools;

/// Keep only the most recent run of each scenario configuration.
///
/// Runs are grouped by scenario name and [ResultSet::fingerprint]. The output is sorted by name
/// and then fingerprint so reports are stable.
pub fn latest_result_sets_by_name_and_config(
    result_sets: Vec<ResultSet>,
) -> Vec<(String, String, ResultSet)> {
    result_sets
        .into_iter()
        .into_group_map_by(|set| (set.scenario_name.clone(), set.fingerprint()))
        .into_iter()
        .filter_map(|((name, fingerprint), sets)| {
            sets.into_iter()
                .max_by_key(|set| set.started_at)
                .map(|latest| (name, fingerprint, latest))
        })
        .sorted_by(|(a_name, a_fp, _), (b_name, b_fp, _)| {
            a_name.cmp(b_name).then_with(|| a_fp.cmp(b_fp))
        })
        .collect()
}
