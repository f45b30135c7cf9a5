//! Wallets and fee/limit estimation.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use walletkit_types::{
    Address, Amount, Currency, FeeEstimationError, LimitEstimationError, ManagerHandle, NetworkFee,
    TransferFeeBasis, TransferHandle, Unit, WalletHandle, WalletState,
};

use crate::callback_coordinator::{CallbackCoordinator, FeeHandler, LimitHandler};
use crate::engine::{SyncEngine, TransferRecord};
use crate::estimation::{settle, MaximumSearch, Step};
use crate::metrics::SystemMetrics;
use crate::tracing_spans::estimation_span;
use crate::transfer::Transfer;
use crate::wallet_manager::WalletManager;

/// Balance and transfer history for one currency under one manager.
pub struct Wallet {
    handle: WalletHandle,
    manager_handle: ManagerHandle,
    manager: Weak<WalletManager>,
    engine: Arc<dyn SyncEngine>,
    coordinator: Arc<CallbackCoordinator>,
    metrics: Arc<SystemMetrics>,
    currency: Currency,
    unit: Unit,
    fee_unit: Unit,
    balance: RwLock<Amount>,
    state: RwLock<WalletState>,
    default_fee_basis: RwLock<Option<TransferFeeBasis>>,
    transfers: RwLock<Vec<Arc<Transfer>>>,
}

impl Wallet {
    pub(crate) fn new(
        handle: WalletHandle,
        manager: &Arc<WalletManager>,
        currency: Currency,
        unit: Unit,
        fee_unit: Unit,
    ) -> Self {
        let balance = Amount::create_i64(0, unit.clone());
        Self {
            handle,
            manager_handle: manager.handle(),
            manager: Arc::downgrade(manager),
            engine: Arc::clone(manager.engine()),
            coordinator: Arc::clone(manager.coordinator()),
            metrics: Arc::clone(manager.metrics()),
            currency,
            unit,
            fee_unit,
            balance: RwLock::new(balance),
            state: RwLock::new(WalletState::Created),
            default_fee_basis: RwLock::new(None),
            transfers: RwLock::new(Vec::new()),
        }
    }

    pub fn handle(&self) -> WalletHandle {
        self.handle
    }

    pub fn manager(&self) -> Option<Arc<WalletManager>> {
        self.manager.upgrade()
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// The wallet's display unit: the network's default unit for its currency.
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn unit_for_fee(&self) -> &Unit {
        &self.fee_unit
    }

    pub fn balance(&self) -> Amount {
        self.balance.read().clone()
    }

    pub(crate) fn set_balance(&self, balance: Amount) {
        *self.balance.write() = balance;
    }

    pub fn state(&self) -> WalletState {
        *self.state.read()
    }

    /// Returns the replaced state, or `None` once the wallet is deleted.
    pub(crate) fn set_state(&self, next: WalletState) -> Option<WalletState> {
        let mut state = self.state.write();
        if *state == WalletState::Deleted {
            return None;
        }
        Some(std::mem::replace(&mut *state, next))
    }

    pub fn default_fee_basis(&self) -> Option<TransferFeeBasis> {
        self.default_fee_basis.read().clone()
    }

    pub(crate) fn set_default_fee_basis(&self, basis: TransferFeeBasis) {
        *self.default_fee_basis.write() = Some(basis);
    }

    // ── Transfers ───────────────────────────────────────────────────────

    pub fn transfers(&self) -> Vec<Arc<Transfer>> {
        self.transfers.read().clone()
    }

    pub fn transfer_by_hash(&self, hash: &str) -> Option<Arc<Transfer>> {
        self.transfers
            .read()
            .iter()
            .find(|t| t.hash().as_deref() == Some(hash))
            .cloned()
    }

    pub fn transfer_by_handle(&self, handle: TransferHandle) -> Option<Arc<Transfer>> {
        self.transfers
            .read()
            .iter()
            .find(|t| t.handle() == handle)
            .cloned()
    }

    /// Get the transfer for `handle`, building it from `record` if new. The
    /// flag is true when the transfer was created by this call.
    pub(crate) fn get_or_insert_transfer(
        &self,
        handle: TransferHandle,
        record: TransferRecord,
    ) -> (Arc<Transfer>, bool) {
        let mut transfers = self.transfers.write();
        if let Some(existing) = transfers.iter().find(|t| t.handle() == handle) {
            return (Arc::clone(existing), false);
        }
        let transfer = Arc::new(Transfer::from_record(
            handle,
            self.handle,
            self.fee_unit.clone(),
            record,
        ));
        transfers.push(Arc::clone(&transfer));
        (transfer, true)
    }

    pub(crate) fn remove_transfer(&self, handle: TransferHandle) -> Option<Arc<Transfer>> {
        let mut transfers = self.transfers.write();
        let index = transfers.iter().position(|t| t.handle() == handle)?;
        Some(transfers.remove(index))
    }

    // ── Estimation ──────────────────────────────────────────────────────

    /// Estimate the fee basis for sending `amount` to `target`. The handler
    /// runs on the system executor.
    pub fn estimate_fee(&self, target: &Address, amount: &Amount, fee: &NetworkFee, handler: FeeHandler) {
        let cookie = self.coordinator.add_fee_handler(handler);
        if let Err(e) = self.engine.estimate_fee_basis(
            self.manager_handle,
            self.handle,
            cookie,
            target,
            amount,
            fee,
        ) {
            warn!(wallet = %self.handle, error = %e, "fee estimate not started");
            self.coordinator
                .complete_fee(cookie, Err(FeeEstimationError::ServiceFailure));
        }
    }

    pub fn estimate_limit_minimum(self: &Arc<Self>, target: Address, fee: NetworkFee, handler: LimitHandler) {
        self.estimate_limit(false, target, fee, handler);
    }

    pub fn estimate_limit_maximum(self: &Arc<Self>, target: Address, fee: NetworkFee, handler: LimitHandler) {
        self.estimate_limit(true, target, fee, handler);
    }

    pub async fn estimate_fee_async(
        &self,
        target: &Address,
        amount: &Amount,
        fee: &NetworkFee,
    ) -> Result<TransferFeeBasis, FeeEstimationError> {
        let (tx, rx) = oneshot::channel();
        self.estimate_fee(
            target,
            amount,
            fee,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await.unwrap_or(Err(FeeEstimationError::ServiceFailure))
    }

    pub async fn estimate_limit_minimum_async(
        self: &Arc<Self>,
        target: Address,
        fee: NetworkFee,
    ) -> Result<Amount, LimitEstimationError> {
        let (tx, rx) = oneshot::channel();
        self.estimate_limit_minimum(
            target,
            fee,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await.unwrap_or(Err(LimitEstimationError::ServiceFailure))
    }

    pub async fn estimate_limit_maximum_async(
        self: &Arc<Self>,
        target: Address,
        fee: NetworkFee,
    ) -> Result<Amount, LimitEstimationError> {
        let (tx, rx) = oneshot::channel();
        self.estimate_limit_maximum(
            target,
            fee,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await.unwrap_or(Err(LimitEstimationError::ServiceFailure))
    }

    fn counted(&self, handler: LimitHandler) -> LimitHandler {
        let metrics = Arc::clone(&self.metrics);
        Box::new(move |result| {
            match &result {
                Ok(_) => metrics.estimations_succeeded.inc(),
                Err(_) => metrics.estimations_failed.inc(),
            }
            handler(result)
        })
    }

    fn fee_wallet(&self, currency: &Currency) -> Option<Arc<Wallet>> {
        self.manager
            .upgrade()?
            .wallets()
            .into_iter()
            .find(|w| w.currency() == currency)
    }

    fn estimate_limit(self: &Arc<Self>, as_maximum: bool, target: Address, fee: NetworkFee, handler: LimitHandler) {
        let _span = estimation_span(&self.handle.to_string(), as_maximum).entered();
        let handler = self.counted(handler);

        let first_pass = match self.engine.estimate_limit(
            self.manager_handle,
            self.handle,
            as_maximum,
            &target,
            &fee,
        ) {
            Ok(first_pass) => first_pass,
            Err(e) => {
                warn!(error = %e, "engine limit estimate failed");
                self.coordinator
                    .complete_limit(handler, Err(LimitEstimationError::ServiceFailure));
                return;
            }
        };

        let Some(amount) = first_pass.amount else {
            self.coordinator
                .complete_limit(handler, Err(LimitEstimationError::InsufficientFunds));
            return;
        };

        if !first_pass.need_fee_estimate {
            let result = if first_pass.is_zero_if_insufficient_funds && amount.is_zero() {
                Err(LimitEstimationError::InsufficientFunds)
            } else {
                Ok(amount)
            };
            self.coordinator.complete_limit(handler, result);
            return;
        }

        let fee_currency = fee.price_per_cost_factor().currency().clone();
        let Some(fee_wallet) = self.fee_wallet(&fee_currency) else {
            debug!(currency = %fee_currency, "no wallet holds the fee currency");
            self.coordinator
                .complete_limit(handler, Err(LimitEstimationError::ServiceFailure));
            return;
        };
        if fee_wallet.balance().is_zero() {
            self.coordinator
                .complete_limit(handler, Err(LimitEstimationError::InsufficientFunds));
            return;
        }

        // Fee paid from another wallet: one estimate, checked against that wallet.
        if fee_wallet.handle() != self.handle {
            let candidate = amount.clone();
            self.estimate_fee(
                &target,
                &amount,
                &fee,
                Box::new(move |result| {
                    handler(match result {
                        Ok(basis) => match basis.fee() {
                            Some(f) => match fee_wallet.balance().compare(&f) {
                                Some(Ordering::Less) => Err(LimitEstimationError::InsufficientFunds),
                                Some(_) => Ok(candidate),
                                None => Err(LimitEstimationError::ServiceFailure),
                            },
                            None => Err(LimitEstimationError::ServiceFailure),
                        },
                        Err(e) => Err(e.into()),
                    })
                }),
            );
            return;
        }

        if !as_maximum {
            let wallet = Arc::clone(self);
            let candidate = amount.clone();
            self.estimate_fee(
                &target,
                &amount,
                &fee,
                Box::new(move |result| {
                    handler(match result {
                        Ok(basis) => match basis.fee() {
                            Some(f) => settle(&wallet.balance(), candidate, &f),
                            None => Err(LimitEstimationError::ServiceFailure),
                        },
                        Err(e) => Err(e.into()),
                    })
                }),
            );
            return;
        }

        let search = MaximumSearch::new(amount.clone(), self.balance());
        Self::search_maximum(Arc::clone(self), target, fee, amount, search, handler);
    }

    /// One round of the same-currency maximum search. Each fee reply either
    /// settles the search or starts the next round with the new candidate.
    fn search_maximum(
        wallet: Arc<Wallet>,
        target: Address,
        fee: NetworkFee,
        candidate: Amount,
        mut search: MaximumSearch,
        handler: LimitHandler,
    ) {
        let next_wallet = Arc::clone(&wallet);
        let next_target = target.clone();
        let next_fee = fee.clone();
        wallet.estimate_fee(
            &target,
            &candidate,
            &fee,
            Box::new(move |result| {
                let estimated = match result {
                    Ok(basis) => basis.fee(),
                    Err(e) => return handler(Err(e.into())),
                };
                let Some(estimated) = estimated else {
                    return handler(Err(LimitEstimationError::ServiceFailure));
                };
                match search.on_fee(&estimated) {
                    Step::Estimate(next) => {
                        debug!(iteration = search.iterations(), amount = %next, "fee moved; re-estimating");
                        Self::search_maximum(next_wallet, next_target, next_fee, next, search, handler)
                    }
                    Step::Done(result) => handler(result),
                }
            }),
        );
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Wallet {}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("handle", &self.handle)
            .field("currency", &self.currency.uids())
            .field("balance", &*self.balance.read())
            .field("state", &*self.state.read())
            .finish()
    }
}
