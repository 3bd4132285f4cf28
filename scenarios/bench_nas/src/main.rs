use ckpt_harness_runner::prelude::*;

/// The NAS parallel benchmarks, used when the registry does not list any benchmarks.
const NAS_BENCHMARKS: [&str; 7] = ["bt", "cg", "ep", "ft", "lu", "mg", "sp"];

fn main() -> HarnessResult<()> {
    let builder = BenchmarkDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"))
        .with_default_targets(NAS_BENCHMARKS)
        .with_default_output("bench_nas_results.json");

    let result_set = run_benchmark(builder)?;
    if result_set.failure_count() > 0 {
        log::warn!(
            "{} of {} benchmark jobs failed",
            result_set.failure_count(),
            result_set.len()
        );
    }

    Ok(())
}
