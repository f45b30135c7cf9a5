//! Per-network synchronization contexts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use walletkit_types::{
    AddressScheme, Currency, ManagerHandle, SyncDepth, SyncMode, WalletHandle, WalletManagerState,
};

use crate::account::Account;
use crate::callback_coordinator::CallbackCoordinator;
use crate::engine::{EngineError, ManagerSpec, SyncEngine};
use crate::metrics::SystemMetrics;
use crate::network::Network;
use crate::transfer::Transfer;
use crate::wallet::Wallet;
use crate::SystemError;

pub struct WalletManager {
    handle: ManagerHandle,
    account: Account,
    network: Arc<Network>,
    path: PathBuf,
    scheme: AddressScheme,
    engine: Arc<dyn SyncEngine>,
    coordinator: Arc<CallbackCoordinator>,
    metrics: Arc<SystemMetrics>,
    mode: RwLock<SyncMode>,
    state: RwLock<WalletManagerState>,
    network_reachable: AtomicBool,
    wallets: RwLock<Vec<Arc<Wallet>>>,
}

impl WalletManager {
    pub(crate) fn new(
        handle: ManagerHandle,
        spec: &ManagerSpec,
        network: Arc<Network>,
        engine: Arc<dyn SyncEngine>,
        coordinator: Arc<CallbackCoordinator>,
        metrics: Arc<SystemMetrics>,
    ) -> Self {
        Self {
            handle,
            account: spec.account.clone(),
            network,
            path: spec.storage_path.clone(),
            scheme: spec.scheme,
            engine,
            coordinator,
            metrics,
            mode: RwLock::new(spec.mode),
            state: RwLock::new(WalletManagerState::Created),
            network_reachable: AtomicBool::new(true),
            wallets: RwLock::new(Vec::new()),
        }
    }

    pub fn handle(&self) -> ManagerHandle {
        self.handle
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn currency(&self) -> &Currency {
        self.network.currency()
    }

    /// The network's current block height.
    pub fn height(&self) -> u64 {
        self.network.height()
    }

    pub fn address_scheme(&self) -> AddressScheme {
        self.scheme
    }

    pub(crate) fn engine(&self) -> &Arc<dyn SyncEngine> {
        &self.engine
    }

    pub(crate) fn coordinator(&self) -> &Arc<CallbackCoordinator> {
        &self.coordinator
    }

    pub(crate) fn metrics(&self) -> &Arc<SystemMetrics> {
        &self.metrics
    }

    // ── State ───────────────────────────────────────────────────────────

    pub fn state(&self) -> WalletManagerState {
        self.state.read().clone()
    }

    /// Apply a transition if the state machine allows it. Returns the
    /// replaced state when applied.
    pub(crate) fn set_state(&self, next: WalletManagerState) -> Option<WalletManagerState> {
        let mut state = self.state.write();
        if !state.can_transition_to(&next) {
            warn!(manager = %self.handle, from = %*state, to = %next, "invalid manager transition ignored");
            return None;
        }
        Some(std::mem::replace(&mut *state, next))
    }

    pub fn mode(&self) -> SyncMode {
        *self.mode.read()
    }

    pub fn set_mode(&self, mode: SyncMode) -> Result<(), SystemError> {
        if !self.network.supports_mode(mode) {
            return Err(SystemError::UnsupportedMode {
                network: self.network.uids().to_string(),
                mode,
            });
        }
        *self.mode.write() = mode;
        self.engine.set_mode(self.handle, mode);
        Ok(())
    }

    pub fn is_network_reachable(&self) -> bool {
        self.network_reachable.load(Ordering::Acquire)
    }

    // ── Engine control ──────────────────────────────────────────────────

    pub fn connect(&self) {
        debug!(manager = %self.handle, "connect");
        self.engine.connect(self.handle);
    }

    pub fn disconnect(&self) {
        debug!(manager = %self.handle, "disconnect");
        self.engine.disconnect(self.handle);
    }

    pub fn sync(&self) {
        self.engine.sync(self.handle);
    }

    pub fn sync_to_depth(&self, depth: SyncDepth) {
        self.engine.sync_to_depth(self.handle, depth);
    }

    pub fn stop(&self) {
        self.engine.stop(self.handle);
    }

    pub fn set_network_reachable(&self, reachable: bool) {
        self.network_reachable.store(reachable, Ordering::Release);
        self.engine.set_network_reachable(self.handle, reachable);
    }

    pub fn submit(&self, wallet: &Wallet, transfer: &Transfer) {
        self.engine.submit(self.handle, wallet.handle(), transfer.handle());
    }

    // ── Wallets ─────────────────────────────────────────────────────────

    pub fn wallets(&self) -> Vec<Arc<Wallet>> {
        self.wallets.read().clone()
    }

    /// The wallet holding the network's native currency.
    pub fn primary_wallet(&self) -> Option<Arc<Wallet>> {
        self.wallet_for(self.network.currency())
    }

    pub fn wallet_for(&self, currency: &Currency) -> Option<Arc<Wallet>> {
        self.wallets
            .read()
            .iter()
            .find(|w| w.currency() == currency)
            .cloned()
    }

    pub fn wallet_by_handle(&self, handle: WalletHandle) -> Option<Arc<Wallet>> {
        self.wallets
            .read()
            .iter()
            .find(|w| w.handle() == handle)
            .cloned()
    }

    /// Ask the engine to track `currency`. The wallet is added when the
    /// engine reports it created.
    pub fn register_wallet_for(&self, currency: &Currency) -> Result<WalletHandle, SystemError> {
        if !self.network.has_currency(currency) {
            return Err(SystemError::UnsupportedCurrency {
                network: self.network.uids().to_string(),
                currency: currency.uids().to_string(),
            });
        }
        if let Some(existing) = self.wallet_for(currency) {
            return Ok(existing.handle());
        }
        self.engine
            .register_wallet(self.handle, currency)
            .ok_or_else(|| {
                EngineError::Other(format!("engine refused a wallet for {}", currency.uids())).into()
            })
    }

    /// Get the wallet for `handle`, building it if new. `None` when the
    /// currency is not part of the network. The flag is true when the
    /// wallet was created by this call.
    pub(crate) fn get_or_insert_wallet(
        self: &Arc<Self>,
        handle: WalletHandle,
        currency_uids: &str,
    ) -> Option<(Arc<Wallet>, bool)> {
        let mut wallets = self.wallets.write();
        if let Some(existing) = wallets.iter().find(|w| w.handle() == handle) {
            return Some((Arc::clone(existing), false));
        }
        let currency = self.network.currency_by_uids(currency_uids)?;
        let unit = self.network.default_unit_for(&currency)?;
        let fee_unit = self.network.default_unit_for(self.network.currency())?;
        let wallet = Arc::new(Wallet::new(handle, self, currency, unit, fee_unit));
        wallets.push(Arc::clone(&wallet));
        Some((wallet, true))
    }

    pub(crate) fn remove_wallet(&self, handle: WalletHandle) -> Option<Arc<Wallet>> {
        let mut wallets = self.wallets.write();
        let index = wallets.iter().position(|w| w.handle() == handle)?;
        Some(wallets.remove(index))
    }
}

impl PartialEq for WalletManager {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for WalletManager {}

impl fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletManager")
            .field("handle", &self.handle)
            .field("network", &self.network.uids())
            .field("mode", &self.mode())
            .field("state", &self.state())
            .finish()
    }
}
