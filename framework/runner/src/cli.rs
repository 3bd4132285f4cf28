use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

use crate::invoker::DEFAULT_TIMEOUT;
use crate::sequencer::{ScenarioMode, TeardownPolicy, Transport};

/// Options shared by every harness binary.
#[derive(Args, Debug, Clone)]
pub struct HarnessCli {
    /// TOML file describing the tools, artifacts, benchmarks and functions.
    ///
    /// Every setting is optional, anything not in the file keeps its default.
    #[arg(long, env = "CKPT_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Where to write the result file. Each binary has its own default.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// The maximum number of jobs to run at once. Defaults to the smaller of 5 and the number of
    /// available cores.
    #[arg(long, short)]
    pub jobs: Option<usize>,

    /// Kill any single invocation that runs for longer than this many seconds. Use 0 to wait
    /// forever.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_s: u64,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,

    /// Identifier recorded with the results. A random one is generated if not provided.
    #[arg(long)]
    pub run_id: Option<String>,
}

impl HarnessCli {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_s > 0).then(|| Duration::from_secs(self.timeout_s))
    }
}

/// Command line for binaries that run a benchmark matrix.
#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct BenchmarkCli {
    #[command(flatten)]
    pub harness: HarnessCli,

    /// Only run these targets. Can be given more than once, for example `--target bt --target ep`.
    #[arg(long = "target", short)]
    pub targets: Vec<String>,

    /// Only run these variants, replacing the ones in the registry. Can be given more than once.
    #[arg(long = "variant", allow_hyphen_values = true)]
    pub variants: Vec<String>,
}

/// Command line for binaries that run an ordered checkpoint and restore scenario.
#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct ScenarioCli {
    #[command(flatten)]
    pub harness: HarnessCli,

    #[arg(long, value_enum, default_value_t = ScenarioMode::Local)]
    pub mode: ScenarioMode,

    #[arg(long, value_enum, default_value_t = Transport::Socket)]
    pub transport: Transport,

    /// Identifier of the remote execution context, for example a container id. Required in
    /// migrate mode.
    #[arg(long)]
    pub context: Option<String>,

    /// What to do with background processes once the scenario is over.
    #[arg(long, value_enum, default_value_t = TeardownPolicy::Detach)]
    pub teardown: TeardownPolicy,

    /// Functions to exercise, in order. Defaults to every function in the registry.
    #[arg(long = "function", short)]
    pub functions: Vec<String>,

    /// Build variant of the server and client artifacts.
    #[arg(long, default_value = ".aot", allow_hyphen_values = true)]
    pub variant: String,

    /// How long a background process has to fail before it is treated as started.
    #[arg(long, default_value_t = 2000)]
    pub startup_grace_ms: u64,
}
