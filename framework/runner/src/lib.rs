mod cli;
mod context;
mod definition;
mod dispatcher;
mod executor;
mod init;
mod invoker;
mod matrix;
mod monitor;
mod progress;
mod registry;
mod run;
mod sequencer;
mod shutdown;
mod tool_path;
mod types;

pub mod prelude {
    pub use crate::cli::{BenchmarkCli, HarnessCli, ScenarioCli};
    pub use crate::context::RunnerContext;
    pub use crate::definition::{BenchmarkDefinitionBuilder, ScenarioDefinitionBuilder};
    pub use crate::dispatcher::{default_pool_size, ParallelDispatcher};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::invoker::{BackgroundProcess, Invoke, ProcessInvoker, DEFAULT_TIMEOUT};
    pub use crate::matrix::JobMatrix;
    pub use crate::registry::{
        ArtifactLayout, BenchmarkTarget, FunctionRef, RemoteLauncher, TargetRegistry, Tool,
        ToolFlags, ToolPaths, TransportTarget, TransportTargets,
    };
    pub use crate::run::{run_benchmark, run_scenario};
    pub use crate::sequencer::{
        ScenarioMode, ScenarioPlan, ScenarioRun, ScenarioSequencer, Step, StepKind, StepRecord,
        TeardownPolicy, Transport, DEFAULT_STARTUP_GRACE,
    };
    pub use crate::tool_path::resolve_tool;
    pub use crate::types::HarnessResult;

    pub use ckpt_harness_core::prelude::*;
    pub use ckpt_harness_instruments::{MetricMarker, EXECUTION_TIME};
    pub use ckpt_harness_summary_model::{
        ExitStatus, JobResult, ResultSet, ResultStore, ScenarioDescriptor,
    };
}
