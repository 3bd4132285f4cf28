use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Environment variables applied on top of the harness environment for one invocation.
///
/// Ordered so that descriptors compare, hash and serialize deterministically.
pub type EnvironmentConfig = BTreeMap<String, String>;

/// One runnable invocation of an external tool.
///
/// Built once by the job matrix or the scenario sequencer and never changed afterwards, so the
/// fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    /// The benchmark or test target, such as `bt` or `client`.
    target_name: String,
    /// Build variant suffix appended to the target to find its artifact, such as `.aot`.
    #[serde(default)]
    variant: String,
    #[serde(default)]
    environment: EnvironmentConfig,
    /// The executable, or invocation string, that is launched.
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

impl ScenarioDescriptor {
    pub fn new(program: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            variant: String::new(),
            environment: EnvironmentConfig::new(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn environment(&self) -> &EnvironmentConfig {
        &self.environment
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The artifact name the tools are pointed at: target followed by the variant suffix.
    pub fn artifact(&self) -> String {
        format!("{}{}", self.target_name, self.variant)
    }

    /// A printable, shell-like rendering of the invocation used to identify the job in reports.
    pub fn command_line(&self) -> String {
        self.environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .chain(std::iter::once(self.program.clone()))
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Display for ScenarioDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_puts_environment_first() {
        let descriptor = ScenarioDescriptor::new("./MVVM_checkpoint", "bt")
            .with_variant(".aot")
            .with_environment(EnvironmentConfig::from([(
                "OMP_NUM_THREADS".to_string(),
                "4".to_string(),
            )]))
            .with_args(["-t", "bench/bt.aot"]);

        assert_eq!(
            descriptor.command_line(),
            "OMP_NUM_THREADS=4 ./MVVM_checkpoint -t bench/bt.aot"
        );
        assert_eq!(descriptor.artifact(), "bt.aot");
    }

    #[test]
    fn empty_variant_leaves_artifact_as_target() {
        let descriptor = ScenarioDescriptor::new("gateway", "gateway");
        assert_eq!(descriptor.artifact(), "gateway");
        assert_eq!(descriptor.command_line(), "gateway");
    }
}
