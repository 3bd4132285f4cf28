use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use ckpt_harness_core::prelude::{HarnessError, ScenarioAbortError};
use ckpt_harness_summary_model::{ExitStatus, JobResult, ScenarioDescriptor};

use crate::invoker::{BackgroundProcess, Invoke};
use crate::registry::{ArtifactLayout, FunctionRef, TargetRegistry, Tool, TransportTarget};
use crate::types::HarnessResult;

/// How long a background step has to fail before it is considered started.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Where the server runs and where the client is restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioMode {
    /// Everything runs on this host.
    #[default]
    Local,
    /// The server runs in a remote execution context and clients are restored there.
    Migrate,
}

/// Which pair of server and client targets the scenario drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    #[default]
    Socket,
    Stream,
}

impl Transport {
    fn targets(self, registry: &TargetRegistry) -> &TransportTarget {
        match self {
            Transport::Socket => &registry.transports.socket,
            Transport::Stream => &registry.transports.stream,
        }
    }
}

/// What happens to background processes once the scenario has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TeardownPolicy {
    /// Leave them running for the external environment to clean up.
    #[default]
    Detach,
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    ServerCheckpoint,
    RemoteServerCheckpoint,
    StartGateway,
    ClientCheckpoint { index: usize },
    ClientRestore { index: usize },
    RemoteClientRestore { index: usize },
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::ServerCheckpoint => f.write_str("server-checkpoint"),
            StepKind::RemoteServerCheckpoint => f.write_str("remote-server-checkpoint"),
            StepKind::StartGateway => f.write_str("start-gateway"),
            StepKind::ClientCheckpoint { index } => write!(f, "client-checkpoint[{index}]"),
            StepKind::ClientRestore { index } => write!(f, "client-restore[{index}]"),
            StepKind::RemoteClientRestore { index } => {
                write!(f, "remote-client-restore[{index}]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub descriptor: ScenarioDescriptor,
    /// Started without waiting for it to finish.
    pub background: bool,
    /// A failure aborts the rest of the scenario.
    pub fatal: bool,
}

/// Describes one checkpoint, restore and optionally migrate scenario before it is turned into
/// concrete steps.
#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    mode: ScenarioMode,
    transport: Transport,
    variant: String,
    functions: Vec<FunctionRef>,
    context: Option<String>,
}

impl ScenarioPlan {
    pub fn new(mode: ScenarioMode, transport: Transport, functions: Vec<FunctionRef>) -> Self {
        Self {
            mode,
            transport,
            variant: ".aot".to_string(),
            functions,
            context: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    /// The remote execution context to run in, passed to the remote launcher as is.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Build the ordered step list.
    ///
    /// Local: checkpoint the server, then checkpoint and restore the client for each function.
    /// Migrate: checkpoint the server in the remote context and start the gateway, both in the
    /// background, then checkpoint the client locally and restore it remotely for each function.
    pub fn steps(&self, registry: &TargetRegistry) -> HarnessResult<Vec<Step>> {
        let targets = self.transport.targets(registry);
        let builder = StepBuilder {
            registry,
            variant: &self.variant,
            server: &targets.server,
            client: &targets.client,
        };

        let mut steps = Vec::with_capacity(2 + self.functions.len() * 2);
        match self.mode {
            ScenarioMode::Local => {
                steps.push(builder.server_checkpoint());
                for function in &self.functions {
                    steps.push(builder.client_checkpoint(function.index));
                    steps.push(builder.client_restore(function.index));
                }
            }
            ScenarioMode::Migrate => {
                let Some(context) = self.context.as_deref().filter(|c| !c.is_empty()) else {
                    bail!("Migrate mode needs a remote execution context, pass one with --context");
                };
                steps.push(builder.remote_server_checkpoint(context));
                steps.push(builder.start_gateway());
                for function in &self.functions {
                    steps.push(builder.client_checkpoint(function.index));
                    steps.push(builder.remote_client_restore(context, function.index));
                }
            }
        }

        Ok(steps)
    }
}

struct StepBuilder<'a> {
    registry: &'a TargetRegistry,
    variant: &'a str,
    server: &'a str,
    client: &'a str,
}

impl StepBuilder<'_> {
    fn artifact(&self, target: &str) -> String {
        ArtifactLayout::artifact_path(&self.registry.artifacts.test_dir, target, self.variant)
    }

    fn descriptor(&self, program: &str, target: &str) -> ScenarioDescriptor {
        ScenarioDescriptor::new(program, target).with_variant(self.variant)
    }

    fn remote_descriptor(&self, context: &str, tool: &str, target: &str) -> ScenarioDescriptor {
        let remote = &self.registry.remote;
        self.descriptor(&remote.program, target)
            .with_args(remote.exec_args.iter().cloned())
            .with_args([context, tool])
    }

    fn server_checkpoint(&self) -> Step {
        let flags = &self.registry.flags;
        Step {
            kind: StepKind::ServerCheckpoint,
            descriptor: self
                .descriptor(self.registry.tool(Tool::Checkpoint), self.server)
                .with_args([flags.target.clone(), self.artifact(self.server)]),
            background: false,
            fatal: true,
        }
    }

    fn remote_server_checkpoint(&self, context: &str) -> Step {
        let flags = &self.registry.flags;
        Step {
            kind: StepKind::RemoteServerCheckpoint,
            descriptor: self
                .remote_descriptor(context, &self.registry.remote.checkpoint, self.server)
                .with_args([flags.target.clone(), self.artifact(self.server)]),
            background: true,
            fatal: true,
        }
    }

    fn start_gateway(&self) -> Step {
        Step {
            kind: StepKind::StartGateway,
            descriptor: ScenarioDescriptor::new(self.registry.tool(Tool::Gateway), "gateway"),
            background: true,
            fatal: false,
        }
    }

    fn client_checkpoint(&self, index: usize) -> Step {
        let flags = &self.registry.flags;
        Step {
            kind: StepKind::ClientCheckpoint { index },
            descriptor: self
                .descriptor(self.registry.tool(Tool::Checkpoint), self.client)
                .with_args([
                    flags.target.clone(),
                    self.artifact(self.client),
                    flags.checkpoint_function.clone(),
                    index.to_string(),
                ]),
            background: false,
            fatal: false,
        }
    }

    fn client_restore(&self, index: usize) -> Step {
        let flags = &self.registry.flags;
        Step {
            kind: StepKind::ClientRestore { index },
            descriptor: self
                .descriptor(self.registry.tool(Tool::Restore), self.client)
                .with_args([
                    flags.target.clone(),
                    self.artifact(self.client),
                    flags.restore_function.clone(),
                    index.to_string(),
                ]),
            background: false,
            fatal: false,
        }
    }

    fn remote_client_restore(&self, context: &str, index: usize) -> Step {
        let flags = &self.registry.flags;
        Step {
            kind: StepKind::RemoteClientRestore { index },
            descriptor: self
                .remote_descriptor(context, &self.registry.remote.restore, self.client)
                .with_args([
                    flags.target.clone(),
                    self.artifact(self.client),
                    flags.restore_function.clone(),
                    index.to_string(),
                ]),
            background: false,
            fatal: false,
        }
    }
}

/// The outcome of one step that was attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub kind: StepKind,
    pub result: JobResult,
}

/// Everything a scenario produced, including the records made before an abort.
#[derive(Debug, Default)]
pub struct ScenarioRun {
    pub records: Vec<StepRecord>,
    pub aborted: Option<ScenarioAbortError>,
}

impl ScenarioRun {
    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| !r.result.success()).count()
    }
}

/// Executes a step list strictly in order, one foreground invocation at a time.
pub struct ScenarioSequencer<I: Invoke> {
    invoker: Arc<I>,
    startup_grace: Duration,
    teardown: TeardownPolicy,
}

impl<I: Invoke> ScenarioSequencer<I> {
    pub fn new(invoker: Arc<I>) -> Self {
        Self {
            invoker,
            startup_grace: DEFAULT_STARTUP_GRACE,
            teardown: TeardownPolicy::default(),
        }
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn with_teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.teardown = teardown;
        self
    }

    /// Run the steps. A failed fatal step stops the scenario; any other failure is recorded and
    /// the next step runs. Background processes are released by the teardown policy before this
    /// returns.
    pub async fn run(&self, steps: Vec<Step>) -> ScenarioRun {
        let mut run = ScenarioRun::default();
        let mut background = Vec::new();

        for step in steps {
            log::info!("Running step [{}]: {}", step.kind, step.descriptor);

            let (result, process) = if step.background {
                self.start_background(&step.descriptor).await
            } else {
                (self.invoker.invoke(step.descriptor.clone()).await, None)
            };
            background.extend(process);

            let failed = !result.success();
            if failed {
                log::warn!("Step [{}] failed: {}", step.kind, result.exit_status);
            }

            let abort = (failed && step.fatal).then(|| {
                ScenarioAbortError::new(step.kind.to_string(), result.exit_status.to_string())
            });
            run.records.push(StepRecord {
                kind: step.kind,
                result,
            });

            if let Some(abort) = abort {
                log::error!("{abort}");
                run.aborted = Some(abort);
                break;
            }
        }

        self.release(background).await;
        run
    }

    async fn start_background(
        &self,
        descriptor: &ScenarioDescriptor,
    ) -> (JobResult, Option<BackgroundProcess>) {
        let mut process = match self.invoker.spawn_background(descriptor) {
            Ok(process) => process,
            Err(e) => {
                return (
                    JobResult::without_output(descriptor.clone(), status_for_error(&e)),
                    None,
                );
            }
        };

        match process.check_startup(self.startup_grace).await {
            Ok(()) => {
                let status = ExitStatus::Backgrounded { pid: process.pid() };
                (
                    JobResult::without_output(descriptor.clone(), status),
                    Some(process),
                )
            }
            Err(e) => (
                JobResult::without_output(descriptor.clone(), status_for_error(&e)),
                None,
            ),
        }
    }

    async fn release(&self, background: Vec<BackgroundProcess>) {
        for process in background {
            match self.teardown {
                TeardownPolicy::Detach => process.detach(),
                TeardownPolicy::Kill => {
                    let descriptor = process.descriptor().clone();
                    if let Err(e) = process.kill().await {
                        log::warn!("Failed to kill background [{descriptor}]: {e}");
                    }
                }
            }
        }
    }
}

fn status_for_error(error: &HarnessError) -> ExitStatus {
    match error {
        HarnessError::NonZeroExit { code, .. } => ExitStatus::Exited { code: *code },
        HarnessError::Timeout { after, .. } => ExitStatus::TimedOut {
            after_ms: after.as_millis() as u64,
        },
        HarnessError::Cancelled { .. } => ExitStatus::Cancelled,
        other => ExitStatus::LaunchFailed {
            reason: other.to_string(),
        },
    }
}
