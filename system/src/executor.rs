//! Execution contexts.
//!
//! Three kinds of context exist per process: the event pump that drains
//! engine lifecycle callbacks, the query pump that services outbound engine
//! queries, and one caller-supplied [`Executor`] per system that is the only
//! place listener callbacks run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::LazyLock;

use tokio::sync::mpsc;
use tracing::{error, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted jobs. Implementations decide on threading, but a system
/// relies on jobs submitted to its executor running in submission order.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// A single named OS thread draining an unbounded queue in FIFO order.
///
/// Submitting never blocks. A panicking job is logged and does not take the
/// thread down. The thread exits once the executor is dropped and the queue
/// is drained.
pub struct SerialExecutor {
    name: String,
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialExecutor {
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let thread_name = name.clone();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(executor = %thread_name, "job panicked");
                    }
                }
            })?;
        Ok(Self { name, tx })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!(executor = %self.name, "executor closed; job dropped");
        }
    }
}

// ── Process-wide pumps ──────────────────────────────────────────────────

static EVENT_PUMP: LazyLock<SerialExecutor> = LazyLock::new(|| {
    SerialExecutor::new("walletkit-events").expect("failed to spawn event pump thread")
});

static QUERY_PUMP: LazyLock<SerialExecutor> = LazyLock::new(|| {
    SerialExecutor::new("walletkit-queries").expect("failed to spawn query pump thread")
});

/// Enqueue engine lifecycle handling. Never blocks the caller.
pub(crate) fn on_event_pump(job: Job) {
    EVENT_PUMP.execute(job);
}

/// Enqueue outbound query handling. Never blocks the caller.
pub(crate) fn on_query_pump(job: Job) {
    QUERY_PUMP.execute(job);
}
