use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use ckpt_harness_instruments::{MetricMarker, EXECUTION_TIME};

use crate::cli::{BenchmarkCli, HarnessCli, ScenarioCli};
use crate::dispatcher::default_pool_size;
use crate::init::init;
use crate::matrix::JobMatrix;
use crate::registry::{BenchmarkTarget, TargetRegistry};
use crate::sequencer::{ScenarioPlan, Step, TeardownPolicy};
use crate::types::HarnessResult;

/// Settings every kind of run needs, resolved from the command line and the registry.
#[derive(Debug)]
pub(crate) struct RunSettings {
    pub name: String,
    pub registry: TargetRegistry,
    pub output: PathBuf,
    pub run_id: String,
    pub pool_size: usize,
    pub timeout: Option<Duration>,
    pub no_progress: bool,
    pub markers: Vec<MetricMarker>,
}

impl RunSettings {
    fn resolve(
        name: String,
        cli: &HarnessCli,
        default_output: Option<PathBuf>,
        markers: Vec<MetricMarker>,
    ) -> HarnessResult<Self> {
        let registry = match &cli.registry {
            Some(path) => {
                log::info!("Loading registry from {}", path.display());
                TargetRegistry::load(path)?
            }
            None => TargetRegistry::default(),
        }
        .resolve_tools();

        let pool_size = match cli.jobs {
            Some(0) => bail!("--jobs must be at least 1"),
            Some(jobs) => jobs,
            None => default_pool_size(),
        };

        let output = cli
            .output
            .clone()
            .or(default_output)
            .unwrap_or_else(|| PathBuf::from(format!("{name}_results.json")));

        Ok(Self {
            run_id: cli.run_id.clone().unwrap_or_else(|| nanoid::nanoid!()),
            name,
            registry,
            output,
            pool_size,
            timeout: cli.timeout(),
            no_progress: cli.no_progress,
            markers,
        })
    }
}

/// The builder for a benchmark matrix run.
///
/// Targets come from `--target`, then the registry's `benchmarks`, then
/// [BenchmarkDefinitionBuilder::with_default_targets]. Variants come from `--variant`, then the
/// registry. Environments always come from the registry.
pub struct BenchmarkDefinitionBuilder {
    /// The name of the benchmark, recorded with the results.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you when using [BenchmarkDefinitionBuilder::new_with_init].
    cli: BenchmarkCli,
    default_targets: Vec<BenchmarkTarget>,
    default_output: Option<PathBuf>,
    markers: Vec<MetricMarker>,
}

pub(crate) struct BenchmarkDefinition {
    pub settings: RunSettings,
    pub matrix: JobMatrix,
}

impl BenchmarkDefinitionBuilder {
    pub fn new(name: &str, cli: BenchmarkCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_targets: Vec::new(),
            default_output: None,
            markers: vec![EXECUTION_TIME],
        }
    }

    /// Initialise logging, parse the command line and create the builder.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, init())
    }

    /// Targets to run when neither the command line nor the registry name any.
    pub fn with_default_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_targets = targets.into_iter().map(BenchmarkTarget::new).collect();
        self
    }

    /// Result file used when `--output` is not given. Defaults to `<name>_results.json`.
    pub fn with_default_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.default_output = Some(output.into());
        self
    }

    /// Markers to extract from each job's output. Defaults to the execution time.
    pub fn with_markers(mut self, markers: Vec<MetricMarker>) -> Self {
        self.markers = markers;
        self
    }

    pub(crate) fn build(self) -> HarnessResult<BenchmarkDefinition> {
        let settings =
            RunSettings::resolve(self.name, &self.cli.harness, self.default_output, self.markers)?;
        let registry = &settings.registry;

        let targets = if !self.cli.targets.is_empty() {
            self.cli
                .targets
                .iter()
                .map(|name| {
                    registry
                        .benchmarks
                        .iter()
                        .find(|known| &known.name == name)
                        .cloned()
                        .unwrap_or_else(|| BenchmarkTarget::new(name.clone()))
                })
                .collect()
        } else if !registry.benchmarks.is_empty() {
            registry.benchmarks.clone()
        } else {
            self.default_targets
        };

        let variants = if self.cli.variants.is_empty() {
            registry.artifacts.variants.clone()
        } else {
            self.cli.variants
        };

        let matrix = JobMatrix::from_registry(registry)
            .with_targets(targets)
            .with_variants(variants);

        Ok(BenchmarkDefinition { settings, matrix })
    }
}

/// The builder for an ordered checkpoint and restore scenario.
pub struct ScenarioDefinitionBuilder {
    /// The name of the scenario, recorded with the results.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you when using [ScenarioDefinitionBuilder::new_with_init].
    cli: ScenarioCli,
    default_output: Option<PathBuf>,
    markers: Vec<MetricMarker>,
}

pub(crate) struct ScenarioDefinition {
    pub settings: RunSettings,
    pub steps: Vec<Step>,
    pub teardown: TeardownPolicy,
    pub startup_grace: Duration,
}

impl ScenarioDefinitionBuilder {
    pub fn new(name: &str, cli: ScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_output: None,
            markers: vec![EXECUTION_TIME],
        }
    }

    /// Initialise logging, parse the command line and create the builder.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, init())
    }

    /// Result file used when `--output` is not given. Defaults to `<name>_results.json`.
    pub fn with_default_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.default_output = Some(output.into());
        self
    }

    pub fn with_markers(mut self, markers: Vec<MetricMarker>) -> Self {
        self.markers = markers;
        self
    }

    /// Resolves every function name and builds the step list, so that an unknown function or a
    /// missing context fails before anything is invoked.
    pub(crate) fn build(self) -> HarnessResult<ScenarioDefinition> {
        let settings =
            RunSettings::resolve(self.name, &self.cli.harness, self.default_output, self.markers)?;
        let registry = &settings.registry;

        let names = if self.cli.functions.is_empty() {
            registry.functions.clone()
        } else {
            self.cli.functions
        };
        let functions = registry.function_indices(&names)?;

        let steps = ScenarioPlan::new(self.cli.mode, self.cli.transport, functions)
            .with_variant(self.cli.variant)
            .with_context(self.cli.context)
            .steps(registry)?;

        Ok(ScenarioDefinition {
            settings,
            steps,
            teardown: self.cli.teardown,
            startup_grace: Duration::from_millis(self.cli.startup_grace_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sequencer::StepKind;

    fn bench(args: &[&str]) -> BenchmarkDefinitionBuilder {
        let cli = BenchmarkCli::try_parse_from(std::iter::once("bench").chain(args.iter().copied()))
            .unwrap();
        BenchmarkDefinitionBuilder::new("bench", cli)
    }

    fn scenario(args: &[&str]) -> ScenarioDefinitionBuilder {
        let cli =
            ScenarioCli::try_parse_from(std::iter::once("scenario").chain(args.iter().copied()))
                .unwrap();
        ScenarioDefinitionBuilder::new("scenario", cli)
    }

    #[test]
    fn default_targets_fill_empty_registry() {
        let definition = bench(&[])
            .with_default_targets(["bt", "cg", "ep"])
            .build()
            .unwrap();
        assert_eq!(definition.matrix.len(), 3);
        assert_eq!(
            definition.settings.output,
            PathBuf::from("bench_results.json")
        );
    }

    #[test]
    fn command_line_targets_win() {
        let definition = bench(&["--target", "lu", "--variant", ".aot", "--variant", "-pure.aot"])
            .with_default_targets(["bt", "cg"])
            .with_default_output("other.json")
            .build()
            .unwrap();
        let names = definition
            .matrix
            .targets()
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["lu"]);
        assert_eq!(definition.matrix.len(), 2);
        assert_eq!(definition.settings.output, PathBuf::from("other.json"));
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(bench(&["--jobs", "0"]).build().is_err());
    }

    #[test]
    fn run_id_is_generated_or_kept() {
        let generated = bench(&[]).build().unwrap();
        assert!(!generated.settings.run_id.is_empty());

        let kept = bench(&["--run-id", "nightly-7"]).build().unwrap();
        assert_eq!(kept.settings.run_id, "nightly-7");
    }

    #[test]
    fn scenario_defaults_to_every_registry_function() {
        let definition = scenario(&[]).build().unwrap();
        assert_eq!(definition.steps.len(), 1 + 4 * 2);
        assert_eq!(definition.teardown, TeardownPolicy::Detach);
    }

    #[test]
    fn scenario_functions_keep_caller_order() {
        let definition = scenario(&["-f", "close", "-f", "socket"]).build().unwrap();
        let kinds = definition.steps.iter().map(|s| s.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                StepKind::ServerCheckpoint,
                StepKind::ClientCheckpoint { index: 3 },
                StepKind::ClientRestore { index: 3 },
                StepKind::ClientCheckpoint { index: 0 },
                StepKind::ClientRestore { index: 0 },
            ]
        );
    }

    #[test]
    fn unknown_function_fails_before_running() {
        let err = scenario(&["-f", "socket", "-f", "nonexistent"])
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn migrate_without_context_fails() {
        assert!(scenario(&["--mode", "migrate"]).build().is_err());
    }
}
