use std::future::Future;

use ckpt_harness_core::prelude::ShutdownHandle;

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is not cancelled on shutdown. Invocations watch the shutdown handle themselves
    /// and finish early with a cancelled status, so the results gathered so far are still
    /// returned and can be stored.
    pub fn execute_in_place<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }
}
