//! Nullable executor: run jobs on the submitting thread.

use std::sync::atomic::{AtomicUsize, Ordering};

use walletkit_system::{Executor, Job};

/// Runs every job immediately on the caller's thread.
///
/// Ordering matches submission order as long as jobs are submitted from one
/// thread, which holds for a system's event and query pumps.
#[derive(Default)]
pub struct InlineExecutor {
    executed: AtomicUsize,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs run so far.
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Acquire)
    }
}

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
        self.executed.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn runs_jobs_in_place() {
        let executor = InlineExecutor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            executor.execute(Box::new(move || seen.lock().unwrap().push(i)));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(executor.executed(), 3);
    }
}
