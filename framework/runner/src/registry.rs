use std::fmt::{Display, Formatter};
use std::path::Path;

use anyhow::{bail, Context};
use ckpt_harness_core::prelude::HarnessError;
use ckpt_harness_summary_model::EnvironmentConfig;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::tool_path::resolve_tool;
use crate::types::HarnessResult;

/// The external executables the harness knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Checkpoint,
    Restore,
    Gateway,
}

impl Tool {
    /// Environment variable that overrides the configured path of this tool.
    pub fn env_var(&self) -> &'static str {
        match self {
            Tool::Checkpoint => "CKPT_CHECKPOINT_PATH",
            Tool::Restore => "CKPT_RESTORE_PATH",
            Tool::Gateway => "CKPT_GATEWAY_PATH",
        }
    }
}

impl Display for Tool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Tool::Checkpoint => f.write_str("checkpoint tool"),
            Tool::Restore => f.write_str("restore tool"),
            Tool::Gateway => f.write_str("gateway"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub checkpoint: String,
    pub restore: String,
    pub gateway: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            checkpoint: "./MVVM_checkpoint".to_string(),
            restore: "./MVVM_restore".to_string(),
            gateway: "./gateway".to_string(),
        }
    }
}

/// Command line flags understood by the checkpoint and restore tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolFlags {
    /// Selects the artifact to run, e.g. `-t test/client.aot`.
    pub target: String,
    /// Passes the function index to the checkpoint tool.
    pub checkpoint_function: String,
    /// Passes the function index to the restore tool.
    pub restore_function: String,
}

impl Default for ToolFlags {
    fn default() -> Self {
        Self {
            target: "-t".to_string(),
            checkpoint_function: "-c".to_string(),
            restore_function: "-f".to_string(),
        }
    }
}

/// Where compiled artifacts live and which build variants exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactLayout {
    /// Directory holding the functional test artifacts (servers and clients).
    pub test_dir: String,
    /// Directory holding the benchmark artifacts.
    pub bench_dir: String,
    /// Suffixes appended to a target name to select a build, such as `.aot`.
    pub variants: Vec<String>,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            test_dir: "test".to_string(),
            bench_dir: "bench".to_string(),
            variants: vec![".aot".to_string()],
        }
    }
}

impl ArtifactLayout {
    pub fn artifact_path(dir: &str, target: &str, variant: &str) -> String {
        Path::new(dir)
            .join(format!("{target}{variant}"))
            .display()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkTarget {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl BenchmarkTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// The server and client targets used for one transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportTarget {
    pub server: String,
    pub client: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportTargets {
    pub socket: TransportTarget,
    pub stream: TransportTarget,
}

impl Default for TransportTargets {
    fn default() -> Self {
        Self {
            socket: TransportTarget {
                server: "server".to_string(),
                client: "client".to_string(),
            },
            stream: TransportTarget {
                server: "tcp_server".to_string(),
                client: "tcp_client".to_string(),
            },
        }
    }
}

/// How to run a tool inside the remote execution context used for migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteLauncher {
    pub program: String,
    /// Arguments placed between the program and the context identifier.
    pub exec_args: Vec<String>,
    /// Path of the checkpoint tool inside the remote context.
    pub checkpoint: String,
    /// Path of the restore tool inside the remote context.
    pub restore: String,
}

impl Default for RemoteLauncher {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            exec_args: vec!["exec".to_string()],
            checkpoint: "MVVM_checkpoint".to_string(),
            restore: "./MVVM_restore".to_string(),
        }
    }
}

/// A function name resolved to the index the tools expect on their command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    pub index: usize,
}

/// Everything the harness knows about the tools it drives and what parameterises them.
///
/// Loaded from TOML, with every field defaulted, and static for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetRegistry {
    pub tools: ToolPaths,
    pub flags: ToolFlags,
    pub artifacts: ArtifactLayout,
    /// Ordered function names. A function's index is its position in this list.
    pub functions: Vec<String>,
    pub benchmarks: Vec<BenchmarkTarget>,
    pub environments: Vec<EnvironmentConfig>,
    pub transports: TransportTargets,
    pub remote: RemoteLauncher,
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            flags: ToolFlags::default(),
            artifacts: ArtifactLayout::default(),
            functions: ["socket", "sendto", "recvfrom", "close"]
                .into_iter()
                .map(String::from)
                .collect(),
            benchmarks: Vec::new(),
            environments: vec![EnvironmentConfig::new()],
            transports: TransportTargets::default(),
            remote: RemoteLauncher::default(),
        }
    }
}

impl TargetRegistry {
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid registry file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> HarnessResult<Self> {
        let registry: TargetRegistry =
            toml::from_str(content).context("Failed to parse registry TOML")?;
        registry.validate()?;
        Ok(registry)
    }

    /// Check the invariants that lookups rely on.
    pub fn validate(&self) -> HarnessResult<()> {
        if let Some(empty) = self.functions.iter().position(|name| name.trim().is_empty()) {
            bail!("Function name at index {empty} is empty");
        }

        let duplicates = self.functions.iter().duplicates().collect::<Vec<_>>();
        if !duplicates.is_empty() {
            bail!("Function names must be unique, duplicated: {duplicates:?}");
        }

        Ok(())
    }

    pub fn function_index(&self, name: &str) -> Result<usize, HarnessError> {
        self.functions
            .iter()
            .position(|known| known == name)
            .ok_or_else(|| HarnessError::LookupFailure(name.to_string()))
    }

    /// Resolve every name, failing on the first unknown one.
    pub fn function_indices<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<FunctionRef>, HarnessError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.function_index(name).map(|index| FunctionRef {
                    name: name.to_string(),
                    index,
                })
            })
            .collect()
    }

    pub fn tool(&self, tool: Tool) -> &str {
        match tool {
            Tool::Checkpoint => &self.tools.checkpoint,
            Tool::Restore => &self.tools.restore,
            Tool::Gateway => &self.tools.gateway,
        }
    }

    fn tool_mut(&mut self, tool: Tool) -> &mut String {
        match tool {
            Tool::Checkpoint => &mut self.tools.checkpoint,
            Tool::Restore => &mut self.tools.restore,
            Tool::Gateway => &mut self.tools.gateway,
        }
    }

    /// Replace each tool with its resolved path.
    ///
    /// A tool that cannot be resolved keeps its configured value so that every job using it is
    /// still attempted and recorded as a launch failure.
    pub fn resolve_tools(mut self) -> Self {
        for tool in [Tool::Checkpoint, Tool::Restore, Tool::Gateway] {
            match resolve_tool(tool, self.tool(tool)) {
                Ok(path) => {
                    log::debug!("Using {tool} at {}", path.display());
                    *self.tool_mut(tool) = path.display().to_string();
                }
                Err(e) => {
                    log::warn!("Could not resolve {tool}, using '{}' as is: {e:#}", self.tool(tool));
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_function_indices() {
        let registry = TargetRegistry::default();
        let refs = registry
            .function_indices(&["socket", "sendto", "recvfrom", "close"])
            .unwrap();
        assert_eq!(
            refs.iter().map(|f| f.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn function_index_is_deterministic() {
        let registry = TargetRegistry::default();
        assert_eq!(
            registry.function_index("close").unwrap(),
            registry.function_index("close").unwrap()
        );
    }

    #[test]
    fn unknown_function_is_lookup_failure() {
        let registry = TargetRegistry::default();
        let err = registry.function_index("nonexistent").unwrap_err();
        assert!(matches!(err, HarnessError::LookupFailure(ref name) if name == "nonexistent"));
    }

    #[test]
    fn function_indices_fail_fast_on_unknown() {
        let registry = TargetRegistry::default();
        assert!(registry.function_indices(&["socket", "bogus", "close"]).is_err());
    }

    #[test]
    fn load_partial_toml_keeps_defaults() {
        let registry = TargetRegistry::from_toml_str(
            r#"
            functions = ["socket", "bind", "listen"]

            [tools]
            checkpoint = "/opt/mvvm/MVVM_checkpoint"

            [[benchmarks]]
            name = "bt"

            [[benchmarks]]
            name = "ep"
            args = ["--class", "A"]

            [[environments]]
            OMP_NUM_THREADS = "1"

            [[environments]]
            OMP_NUM_THREADS = "4"
            "#,
        )
        .unwrap();

        assert_eq!(registry.tools.checkpoint, "/opt/mvvm/MVVM_checkpoint");
        assert_eq!(registry.tools.restore, "./MVVM_restore");
        assert_eq!(registry.function_index("listen").unwrap(), 2);
        assert_eq!(registry.benchmarks[1].args, vec!["--class", "A"]);
        assert_eq!(registry.environments.len(), 2);
        assert_eq!(registry.artifacts.variants, vec![".aot"]);
    }

    #[test]
    fn duplicate_functions_are_rejected() {
        let result = TargetRegistry::from_toml_str(r#"functions = ["socket", "close", "socket"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(TargetRegistry::from_toml_str("[tools]\ncheckpiont = \"x\"").is_err());
    }

    #[test]
    fn artifact_path_joins_dir_target_and_variant() {
        assert_eq!(
            ArtifactLayout::artifact_path("test", "client", ".aot"),
            "test/client.aot"
        );
    }
}
