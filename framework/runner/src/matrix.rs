use ckpt_harness_summary_model::{EnvironmentConfig, ScenarioDescriptor};
use itertools::Itertools;

use crate::registry::{ArtifactLayout, BenchmarkTarget, TargetRegistry, Tool};

/// Generates the benchmark job matrix: every target, in every variant, under every environment.
///
/// The order is target (outer), variant (middle), environment (inner), so a job's position
/// identifies the triple that produced it.
#[derive(Debug, Clone)]
pub struct JobMatrix {
    program: String,
    target_flag: String,
    artifact_dir: String,
    targets: Vec<BenchmarkTarget>,
    variants: Vec<String>,
    environments: Vec<EnvironmentConfig>,
}

impl JobMatrix {
    pub fn new(program: impl Into<String>, artifact_dir: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            target_flag: "-t".to_string(),
            artifact_dir: artifact_dir.into(),
            targets: Vec::new(),
            variants: Vec::new(),
            environments: Vec::new(),
        }
    }

    /// A matrix over the registry's checkpoint tool, benchmark directory, benchmarks, variants
    /// and environments.
    pub fn from_registry(registry: &TargetRegistry) -> Self {
        Self::new(
            registry.tool(Tool::Checkpoint),
            registry.artifacts.bench_dir.clone(),
        )
        .with_target_flag(registry.flags.target.clone())
        .with_targets(registry.benchmarks.clone())
        .with_variants(registry.artifacts.variants.clone())
        .with_environments(registry.environments.clone())
    }

    pub fn with_target_flag(mut self, flag: impl Into<String>) -> Self {
        self.target_flag = flag.into();
        self
    }

    pub fn with_targets(mut self, targets: Vec<BenchmarkTarget>) -> Self {
        self.targets = dedup("target", targets);
        self
    }

    pub fn with_variants(mut self, variants: Vec<String>) -> Self {
        self.variants = dedup("variant", variants);
        self
    }

    pub fn with_environments(mut self, environments: Vec<EnvironmentConfig>) -> Self {
        self.environments = dedup("environment", environments);
        self
    }

    pub fn targets(&self) -> &[BenchmarkTarget] {
        &self.targets
    }

    /// The number of descriptors [JobMatrix::generate] will produce.
    pub fn len(&self) -> usize {
        self.targets.len() * self.variants.len() * self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generate(&self) -> Vec<ScenarioDescriptor> {
        let mut descriptors = Vec::with_capacity(self.len());
        for target in &self.targets {
            for variant in &self.variants {
                for environment in &self.environments {
                    let artifact =
                        ArtifactLayout::artifact_path(&self.artifact_dir, &target.name, variant);
                    descriptors.push(
                        ScenarioDescriptor::new(self.program.clone(), target.name.clone())
                            .with_variant(variant.clone())
                            .with_environment(environment.clone())
                            .with_args([self.target_flag.clone(), artifact])
                            .with_args(target.args.iter().cloned()),
                    );
                }
            }
        }
        descriptors
    }
}

fn dedup<T>(dimension: &str, values: Vec<T>) -> Vec<T>
where
    T: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    let total = values.len();
    let unique = values.into_iter().unique().collect::<Vec<_>>();
    if unique.len() != total {
        log::warn!(
            "Ignoring {} duplicate {dimension} entries in the job matrix",
            total - unique.len()
        );
    }
    unique
}
