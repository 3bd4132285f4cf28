use std::sync::Arc;

use ckpt_harness_summary_model::{ExitStatus, JobResult, ScenarioDescriptor};
use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::invoker::Invoke;

/// Upper bound on the default pool size.
pub const DEFAULT_POOL_LIMIT: usize = 5;

/// `min(5, available parallelism)`, or 1 if the parallelism cannot be determined.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(DEFAULT_POOL_LIMIT))
        .unwrap_or(1)
}

/// Runs independent jobs on a bounded pool and returns their results in submission order.
#[derive(Debug, Clone)]
pub struct ParallelDispatcher {
    pool_size: usize,
    progress: Option<ProgressBar>,
}

impl Default for ParallelDispatcher {
    fn default() -> Self {
        Self::new(default_pool_size())
    }
}

impl ParallelDispatcher {
    /// A pool size of 0 is treated as 1.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run every descriptor exactly once, at most `pool_size` at a time.
    ///
    /// Returns after every job has finished. The result at position `i` belongs to the descriptor
    /// at position `i`.
    pub async fn dispatch<I: Invoke>(
        &self,
        invoker: Arc<I>,
        descriptors: Vec<ScenarioDescriptor>,
    ) -> Vec<JobResult> {
        log::info!(
            "Dispatching {} jobs with up to {} running at once",
            descriptors.len(),
            self.pool_size
        );

        let permits = Arc::new(Semaphore::new(self.pool_size));
        let mut workers = JoinSet::new();
        for (index, descriptor) in descriptors.iter().cloned().enumerate() {
            let permits = permits.clone();
            let invoker = invoker.clone();
            workers.spawn(async move {
                // The semaphore is never closed, so a permit is always granted eventually.
                let _permit = permits.acquire_owned().await.ok();
                let result = invoker.invoke(descriptor).await;
                (index, result)
            });
        }

        let mut slots = descriptors.iter().map(|_| None).collect::<Vec<_>>();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(progress) = &self.progress {
                        progress.inc(1);
                    }
                    slots[index] = Some(result);
                }
                Err(e) => {
                    log::error!("Job worker ended without a result: {e}");
                }
            }
        }

        descriptors
            .into_iter()
            .zip(slots)
            .map(|(descriptor, slot)| {
                slot.unwrap_or_else(|| {
                    JobResult::without_output(
                        descriptor,
                        ExitStatus::LaunchFailed {
                            reason: "job worker ended without reporting a result".to_string(),
                        },
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ckpt_harness_core::prelude::HarnessError;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    use super::*;
    use crate::invoker::BackgroundProcess;

    /// Sleeps for a random time and echoes the target name back as output.
    #[derive(Default)]
    struct SleepyInvoker {
        running: AtomicUsize,
        max_running: AtomicUsize,
        panic_on: Option<String>,
    }

    impl Invoke for SleepyInvoker {
        fn invoke(&self, descriptor: ScenarioDescriptor) -> impl Future<Output = JobResult> + Send {
            async move {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_running.fetch_max(now, Ordering::SeqCst);

                let delay = rand::thread_rng().gen_range(0..20);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                self.running.fetch_sub(1, Ordering::SeqCst);

                if self.panic_on.as_deref() == Some(descriptor.target_name()) {
                    panic!("worker crashed");
                }

                let output = descriptor.target_name().to_string();
                JobResult::new(
                    descriptor,
                    output,
                    ExitStatus::Exited { code: Some(0) },
                    Duration::from_millis(delay),
                )
            }
        }

        fn spawn_background(
            &self,
            descriptor: &ScenarioDescriptor,
        ) -> Result<BackgroundProcess, HarnessError> {
            Ok(BackgroundProcess::untracked(descriptor.clone()))
        }
    }

    fn jobs(n: usize) -> Vec<ScenarioDescriptor> {
        (0..n)
            .map(|i| ScenarioDescriptor::new("fake", format!("job-{i}")))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn results_come_back_in_submission_order() {
        let invoker = Arc::new(SleepyInvoker::default());
        let results = ParallelDispatcher::new(5)
            .dispatch(invoker, jobs(40))
            .await;

        assert_eq!(results.len(), 40);
        let outputs = results.iter().map(|r| r.raw_output.clone()).collect::<Vec<_>>();
        let expected = (0..40).map(|i| format!("job-{i}")).collect::<Vec<_>>();
        assert_eq!(outputs, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_pool_size() {
        let invoker = Arc::new(SleepyInvoker::default());
        ParallelDispatcher::new(3)
            .dispatch(invoker.clone(), jobs(30))
            .await;

        let max = invoker.max_running.load(Ordering::SeqCst);
        assert!(max <= 3, "{max} jobs ran at once");
        assert!(max >= 1);
    }

    #[tokio::test]
    async fn no_jobs_gives_no_results() {
        let results = ParallelDispatcher::default()
            .dispatch(Arc::new(SleepyInvoker::default()), Vec::new())
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn crashed_worker_fills_its_slot() {
        let invoker = Arc::new(SleepyInvoker {
            panic_on: Some("job-2".to_string()),
            ..Default::default()
        });
        let results = ParallelDispatcher::new(2).dispatch(invoker, jobs(5)).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[2].descriptor.target_name(), "job-2");
        assert!(matches!(
            results[2].exit_status,
            ExitStatus::LaunchFailed { .. }
        ));
        assert!(results
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .all(|(_, r)| r.success()));
    }

    #[test]
    fn pool_size_is_at_least_one() {
        assert_eq!(ParallelDispatcher::new(0).pool_size(), 1);
        let default = default_pool_size();
        assert!((1..=DEFAULT_POOL_LIMIT).contains(&default));
    }
}
