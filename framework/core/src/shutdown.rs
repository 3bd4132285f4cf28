use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{error::TryRecvError, Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts a single shutdown request to every invocation started by the harness.
///
/// The request is also latched, so work that subscribes after the signal was sent (for example a
/// job still waiting for a worker slot) can see it through [ShutdownHandle::is_shutdown].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        if let Err(e) = self.sender.send(()) {
            // Nobody is listening when no invocation is in flight.
            log::debug!("No listeners for shutdown signal: {e:?}");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe(), self.triggered.clone())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    triggered: Arc<AtomicBool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>, triggered: Arc<AtomicBool>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            triggered,
        }
    }

    /// Point in time check if the shutdown signal has been received.
    pub fn should_shutdown(&mut self) -> bool {
        if self.triggered.load(Ordering::SeqCst) {
            return true;
        }

        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) => true,
                Err(TryRecvError::Closed) => true,
                // Empty or lagged, keep going.
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Wait until shutdown is requested. Safe to race against other futures so that the signal
    /// can cancel work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }

        let mut guard = self.receiver.lock().await;
        if let Err(e) = guard.recv().await {
            // The handle was dropped, which only happens when the harness is exiting anyway.
            log::trace!("Shutdown channel ended: {e:?}");
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}
