use ckpt_harness_runner::prelude::*;

fn main() -> HarnessResult<()> {
    let builder = ScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"))
        .with_default_output("sock_migrate_results.json");

    run_scenario(builder)?;

    Ok(())
}
