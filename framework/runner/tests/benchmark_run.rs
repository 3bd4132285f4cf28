#![cfg(unix)]

mod common;

use ckpt_harness_runner::prelude::*;
use ckpt_harness_summary_model::MetricValue;
use pretty_assertions::assert_eq;

use common::{harness_cli, write_registry, write_tool};

fn benchmark(name: &str, harness: HarnessCli) -> BenchmarkDefinitionBuilder {
    BenchmarkDefinitionBuilder::new(
        name,
        BenchmarkCli {
            harness,
            targets: vec![],
            variants: vec![],
        },
    )
}

fn registry_toml(checkpoint: &str) -> String {
    format!(
        r#"
        [tools]
        checkpoint = "{checkpoint}"

        [artifacts]
        bench_dir = "bench"
        variants = [".aot", "-pure.aot"]

        [[benchmarks]]
        name = "bt"

        [[benchmarks]]
        name = "cg"

        [[environments]]
        OMP_NUM_THREADS = "2"
        "#
    )
}

#[test]
fn benchmark_matrix_is_run_recorded_and_stored_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(
        dir.path(),
        "MVVM_checkpoint",
        r#"echo "running $2 with $OMP_NUM_THREADS threads"
echo "Execution time: 0.5s""#,
    );
    let registry = write_registry(dir.path(), &registry_toml(&tool.display().to_string()));
    let output = dir.path().join("out").join("bench_results.json");

    let result_set = run_benchmark(benchmark("bench_matrix", harness_cli(&registry, &output)))
        .unwrap();

    assert_eq!(result_set.len(), 4);
    assert_eq!(result_set.failure_count(), 0);
    assert_eq!(result_set.run_id, "integration");
    assert_eq!(result_set.scenario_name, "bench_matrix");

    let artifacts = result_set
        .entries
        .iter()
        .map(|entry| entry.result.descriptor.args()[1].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        artifacts,
        vec![
            "bench/bt.aot",
            "bench/bt-pure.aot",
            "bench/cg.aot",
            "bench/cg-pure.aot"
        ]
    );

    let first = &result_set.entries[0];
    assert_eq!(
        first.result.raw_output,
        "running bench/bt.aot with 2 threads\nExecution time: 0.5s\n"
    );
    assert_eq!(
        first.metrics[0].value,
        MetricValue::Text("Execution time: 0.5s".to_string())
    );

    let stored = ResultStore::new(&output).load().unwrap();
    assert_eq!(stored, result_set);
}

#[test]
fn failing_jobs_are_recorded_without_failing_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(
        dir.path(),
        "MVVM_checkpoint",
        r#"case "$2" in
  *cg*) echo "Execution time: 9s"; echo "trap: out of bounds" >&2; exit 1 ;;
esac
echo "Execution time: 0.5s""#,
    );
    let registry = write_registry(dir.path(), &registry_toml(&tool.display().to_string()));
    let output = dir.path().join("bench_results.json");

    let result_set =
        run_benchmark(benchmark("bench_failures", harness_cli(&registry, &output))).unwrap();

    assert_eq!(result_set.len(), 4);
    assert_eq!(result_set.failure_count(), 2);

    let failed = &result_set.entries[2];
    assert_eq!(failed.result.exit_status, ExitStatus::Exited { code: Some(1) });
    assert!(failed.result.raw_output.ends_with("trap: out of bounds\n"));
    assert_eq!(failed.metrics.len(), 1);
}

#[test]
fn missing_tool_is_recorded_as_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(
        dir.path(),
        &registry_toml("/definitely/not/installed/MVVM_checkpoint"),
    );
    let output = dir.path().join("bench_results.json");

    let result_set =
        run_benchmark(benchmark("bench_missing", harness_cli(&registry, &output))).unwrap();

    assert_eq!(result_set.len(), 4);
    assert!(result_set
        .entries
        .iter()
        .all(|entry| matches!(entry.result.exit_status, ExitStatus::LaunchFailed { .. })));
    assert!(output.exists());
}

#[test]
fn invalid_registry_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write_registry(dir.path(), "functions = [\"socket\", \"socket\"]");
    let output = dir.path().join("bench_results.json");

    let result = run_benchmark(benchmark("bench_invalid", harness_cli(&registry, &output)));

    assert!(result.is_err());
    assert!(!output.exists());
}
