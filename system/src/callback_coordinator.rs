//! Pending completion handlers for out-of-band engine replies.
//!
//! A fee estimate is requested from the engine with a [`Cookie`]; the reply
//! comes back later as a wallet event carrying that cookie. The coordinator
//! maps the cookie back to the caller's handler and runs it on the system's
//! executor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;
use walletkit_types::{Amount, Cookie, FeeEstimationError, LimitEstimationError, TransferFeeBasis};

use crate::executor::Executor;

pub type FeeHandler = Box<dyn FnOnce(Result<TransferFeeBasis, FeeEstimationError>) + Send + 'static>;
pub type LimitHandler = Box<dyn FnOnce(Result<Amount, LimitEstimationError>) + Send + 'static>;

pub struct CallbackCoordinator {
    executor: Arc<dyn Executor>,
    next_cookie: AtomicU64,
    /// Handlers are `Send` but not `Sync`; the mutex makes the map shareable.
    pending: DashMap<Cookie, Mutex<FeeHandler>>,
}

impl CallbackCoordinator {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            next_cookie: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Park `handler` and return the cookie that will complete it.
    pub fn add_fee_handler(&self, handler: FeeHandler) -> Cookie {
        let cookie = Cookie::new(self.next_cookie.fetch_add(1, Ordering::Relaxed));
        self.pending.insert(cookie, Mutex::new(handler));
        cookie
    }

    /// Drop a parked handler without running it.
    pub fn remove(&self, cookie: Cookie) -> Option<FeeHandler> {
        self.pending
            .remove(&cookie)
            .map(|(_, handler)| handler.into_inner())
    }

    /// Run the handler parked under `cookie` on the executor. Returns false
    /// for an unknown or already completed cookie.
    pub fn complete_fee(
        &self,
        cookie: Cookie,
        result: Result<TransferFeeBasis, FeeEstimationError>,
    ) -> bool {
        match self.remove(cookie) {
            Some(handler) => {
                self.executor.execute(Box::new(move || handler(result)));
                true
            }
            None => {
                warn!(%cookie, "fee estimate for unknown cookie");
                false
            }
        }
    }

    pub fn complete_limit(&self, handler: LimitHandler, result: Result<Amount, LimitEstimationError>) {
        self.executor.execute(Box::new(move || handler(result)));
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
