use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ckpt_harness_core::prelude::{DelegatedShutdownListener, HarnessError, ShutdownHandle};
use ckpt_harness_summary_model::{ExitStatus, JobResult, ScenarioDescriptor};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Default limit on how long a single invocation may run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// How long to keep draining output pipes once the process itself has finished.
///
/// Only matters when something the tool started still holds its stdout or stderr open.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Drain limit after the harness killed the process. Whatever is still buffered in the pipe is
/// read almost at once, anything slower belongs to a descendant that outlived the kill.
const KILLED_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs scenario descriptors as external processes.
///
/// [ProcessInvoker] is the implementation used by the binaries. The trait exists so that the
/// dispatcher and sequencer can be driven without real tools.
pub trait Invoke: Send + Sync + 'static {
    /// Run the descriptor to completion. Never fails: every failure is described by the
    /// returned result's exit status.
    fn invoke(&self, descriptor: ScenarioDescriptor) -> impl Future<Output = JobResult> + Send;

    /// Start the descriptor without waiting for it to finish.
    fn spawn_background(
        &self,
        descriptor: &ScenarioDescriptor,
    ) -> Result<BackgroundProcess, HarnessError>;
}

#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
    shutdown: Option<ShutdownHandle>,
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any invocation that runs longer than `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kill in-flight invocations, and refuse to start new ones, once `shutdown` is signalled.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(ShutdownHandle::is_shutdown)
            .unwrap_or(false)
    }

    async fn run(&self, descriptor: ScenarioDescriptor) -> JobResult {
        if self.is_shutdown() {
            return JobResult::without_output(descriptor, ExitStatus::Cancelled);
        }

        let started = Instant::now();
        let mut command = Command::new(descriptor.program());
        command
            .args(descriptor.args())
            .envs(descriptor.environment())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Failed to launch [{descriptor}]: {e}");
                return JobResult::new(
                    descriptor,
                    String::new(),
                    ExitStatus::LaunchFailed {
                        reason: e.to_string(),
                    },
                    started.elapsed(),
                );
            }
        };
        log::debug!("Started [{descriptor}] with PID {:?}", child.id());

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let outcome = self.wait(&mut child).await;
        let grace = if matches!(outcome, WaitOutcome::TimedOut(_) | WaitOutcome::Cancelled) {
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill [{descriptor}]: {e}");
            }
            KILLED_DRAIN_GRACE
        } else {
            OUTPUT_DRAIN_GRACE
        };

        let ((mut raw_output, stdout_complete), (stderr_output, stderr_complete)) = tokio::join!(
            drain(stdout, grace, &descriptor),
            drain(stderr, grace, &descriptor)
        );
        raw_output.push_str(&stderr_output);

        let exit_status = match outcome {
            WaitOutcome::Exited(Ok(status)) => ExitStatus::Exited {
                code: status.code(),
            },
            WaitOutcome::Exited(Err(e)) => ExitStatus::LaunchFailed {
                reason: format!("Failed to wait for process: {e}"),
            },
            WaitOutcome::TimedOut(after) => {
                log::warn!("[{descriptor}] timed out after {after:?} and was killed");
                ExitStatus::TimedOut {
                    after_ms: after.as_millis() as u64,
                }
            }
            WaitOutcome::Cancelled => ExitStatus::Cancelled,
        };

        let elapsed = started.elapsed();
        log::debug!("[{descriptor}] finished with {exit_status} in {elapsed:?}");

        let result = JobResult::new(descriptor, raw_output, exit_status, elapsed);
        if stdout_complete && stderr_complete {
            result
        } else {
            result.with_truncated_output()
        }
    }

    async fn wait(&self, child: &mut Child) -> WaitOutcome {
        let mut shutdown_listener = self.shutdown.as_ref().map(ShutdownHandle::new_listener);
        let timeout = self.timeout;

        let wait = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                    Ok(status) => WaitOutcome::Exited(status),
                    Err(_) => WaitOutcome::TimedOut(limit),
                },
                None => WaitOutcome::Exited(child.wait().await),
            }
        };

        tokio::select! {
            outcome = wait => outcome,
            _ = shutdown_requested(&mut shutdown_listener) => WaitOutcome::Cancelled,
        }
    }
}

impl Invoke for ProcessInvoker {
    fn invoke(&self, descriptor: ScenarioDescriptor) -> impl Future<Output = JobResult> + Send {
        self.run(descriptor)
    }

    fn spawn_background(
        &self,
        descriptor: &ScenarioDescriptor,
    ) -> Result<BackgroundProcess, HarnessError> {
        if self.is_shutdown() {
            return Err(HarnessError::Cancelled {
                program: descriptor.program().to_string(),
            });
        }

        let child = Command::new(descriptor.program())
            .args(descriptor.args())
            .envs(descriptor.environment())
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| HarnessError::LaunchFailure {
                program: descriptor.program().to_string(),
                reason: e.to_string(),
            })?;
        log::info!(
            "Started background [{descriptor}] with PID {:?}",
            child.id()
        );

        Ok(BackgroundProcess {
            descriptor: descriptor.clone(),
            child: Some(child),
        })
    }
}

async fn shutdown_requested(listener: &mut Option<DelegatedShutdownListener>) {
    match listener {
        Some(listener) => listener.wait_for_shutdown().await,
        None => std::future::pending().await,
    }
}

/// Output read so far from one pipe. Shared with the reader task so that a reader which never
/// reaches end of file still leaves its bytes behind.
struct OutputReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<OutputReader>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        log::debug!("Output pipe closed with error: {e}");
                        break;
                    }
                }
            }
        });
        OutputReader { buffer, task }
    })
}

/// Everything the reader collected, and whether the pipe was read to the end.
async fn drain(
    reader: Option<OutputReader>,
    grace: Duration,
    descriptor: &ScenarioDescriptor,
) -> (String, bool) {
    let Some(OutputReader { buffer, mut task }) = reader else {
        return (String::new(), true);
    };

    let complete = match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::warn!("Output reader for [{descriptor}] failed: {e}");
            false
        }
        Err(_) => {
            task.abort();
            // Only fails with the cancellation just requested.
            let _ = task.await;
            log::warn!(
                "Output of [{descriptor}] still open {grace:?} after exit, keeping what was read so far"
            );
            false
        }
    };

    let bytes = std::mem::take(&mut *buffer.lock().await);
    (String::from_utf8_lossy(&bytes).into_owned(), complete)
}

/// A process started by the sequencer that keeps running while later steps execute.
///
/// The scenario owns the handle until [BackgroundProcess::detach] or [BackgroundProcess::kill]
/// is called by the teardown hook.
#[derive(Debug)]
pub struct BackgroundProcess {
    descriptor: ScenarioDescriptor,
    child: Option<Child>,
}

impl BackgroundProcess {
    /// A handle with no process behind it, for invokers that do not start real processes.
    pub fn untracked(descriptor: ScenarioDescriptor) -> Self {
        Self {
            descriptor,
            child: None,
        }
    }

    pub fn descriptor(&self) -> &ScenarioDescriptor {
        &self.descriptor
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Give the process `grace` to fail. Exiting successfully, or still running, is fine.
    pub async fn check_startup(&mut self, grace: Duration) -> Result<(), HarnessError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        match tokio::time::timeout(grace, child.wait()).await {
            Err(_) => Ok(()),
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(HarnessError::NonZeroExit {
                program: self.descriptor.program().to_string(),
                code: status.code(),
            }),
            Ok(Err(e)) => Err(HarnessError::LaunchFailure {
                program: self.descriptor.program().to_string(),
                reason: format!("Failed to wait for process: {e}"),
            }),
        }
    }

    /// Leave the process running, owned by the external environment from now on.
    pub fn detach(self) {
        if let Some(pid) = self.pid() {
            log::info!("Leaving [{}] running with PID {pid}", self.descriptor);
        }
    }

    pub async fn kill(mut self) -> std::io::Result<()> {
        match self.child.as_mut() {
            Some(child) => {
                log::info!("Killing background [{}]", self.descriptor);
                match child.kill().await {
                    Ok(()) => Ok(()),
                    // Already exited.
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        }
    }
}
