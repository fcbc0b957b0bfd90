//! Where completion callbacks run.

use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A boxed callback posted to a [`CallbackQueue`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution context for export completion callbacks.
#[derive(Clone, Debug)]
pub enum CallbackQueue {
    /// Run on whichever worker finished last.
    Worker,
    /// Spawn onto a Tokio runtime.
    Runtime(Handle),
    /// Post to a queue drained by the caller, e.g. a UI loop.
    Channel(mpsc::UnboundedSender<Job>),
}

impl CallbackQueue {
    /// A channel-backed queue and the receiver the caller drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Channel(tx), rx)
    }

    /// Run `job` on this queue.
    ///
    /// A closed channel falls back to running the job in place so it is
    /// never lost.
    pub fn deliver(&self, job: impl FnOnce() + Send + 'static) {
        match self {
            Self::Worker => job(),
            Self::Runtime(handle) => {
                handle.spawn(async move { job() });
            }
            Self::Channel(tx) => {
                if let Err(mpsc::error::SendError(job)) = tx.send(Box::new(job)) {
                    tracing::warn!("Callback queue closed; running callback in place");
                    job();
                }
            }
        }
    }
}

/// Run every job currently waiting in `rx`. Returns how many ran.
pub fn run_pending(rx: &mut mpsc::UnboundedReceiver<Job>) -> usize {
    let mut ran = 0;
    while let Ok(job) = rx.try_recv() {
        job();
        ran += 1;
    }
    ran
}
