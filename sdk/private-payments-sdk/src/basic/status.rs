use crate::types::TransferStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Publishes orchestrator progress to any number of observers.
/// Observers only display it; nothing reads it back for control flow.
pub struct StatusReporter {
    tx: watch::Sender<Option<TransferStatus>>,
    in_flight: AtomicBool,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TransferStatus>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<TransferStatus> {
        self.tx.borrow().clone()
    }

    pub fn report(&self, step: &str, progress: u8) {
        self.tx.send_replace(Some(TransferStatus {
            step: step.to_string(),
            progress: progress.min(100),
        }));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Mark a run as started. `None` when another run holds the slot.
    pub fn begin(&self) -> Option<RunGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                reporter: self,
                succeeded: false,
            })
    }
}

/// Releases the run slot on drop and clears the status unless the run was
/// marked successful.
pub struct RunGuard<'a> {
    reporter: &'a StatusReporter,
    succeeded: bool,
}

impl RunGuard<'_> {
    pub fn succeed(mut self, step: &str) {
        self.reporter.report(step, 100);
        self.succeeded = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.succeeded {
            self.reporter.clear();
        }
        self.reporter.in_flight.store(false, Ordering::Release);
    }
}
