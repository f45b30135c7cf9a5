//! The root aggregate.
//!
//! A [`System`] owns the networks and wallet managers of one account and is
//! the only place application events are emitted from. All listener calls
//! are submitted to the system's executor, which fixes their order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use walletkit_blockchaindb::{BlockchainDb, CurrencyModel};
use walletkit_types::{AddressScheme, Currency, ManagerHandle, SyncMode, SystemToken};
use walletkit_utils::{delete_recursively, ensure_path, wipe_all_except};

use crate::account::Account;
use crate::callback_coordinator::CallbackCoordinator;
use crate::config::SystemConfig;
use crate::discovery::{parse_fees, NetworkDiscovery};
use crate::engine::{
    BlockBlob, EngineContext, ManagerSpec, MigrateError, PeerBlob, SyncEngine, TransactionBlob,
};
use crate::events::{
    NetworkEvent, SystemEvent, SystemListener, TransferEvent, WalletEvent, WalletManagerEvent,
};
use crate::executor::Executor;
use crate::metrics::SystemMetrics;
use crate::network::Network;
use crate::registry;
use crate::tracing_spans::discovery_span;
use crate::transfer::Transfer;
use crate::wallet::Wallet;
use crate::wallet_manager::WalletManager;
use crate::SystemError;

pub type FeeUpdateHandler =
    Box<dyn FnOnce(Result<Vec<Arc<Network>>, SystemError>) + Send + 'static>;

/// Collaborators a system is wired to.
pub struct SystemContext {
    pub listener: Arc<dyn SystemListener>,
    pub executor: Arc<dyn Executor>,
    pub query: Arc<dyn BlockchainDb>,
    pub engine: Arc<dyn SyncEngine>,
}

pub struct System {
    token: SystemToken,
    account: Account,
    path: PathBuf,
    config: SystemConfig,
    listener: Arc<dyn SystemListener>,
    executor: Arc<dyn Executor>,
    query: Arc<dyn BlockchainDb>,
    engine: Arc<dyn SyncEngine>,
    coordinator: Arc<CallbackCoordinator>,
    metrics: Arc<SystemMetrics>,
    networks: RwLock<Vec<Arc<Network>>>,
    managers: RwLock<Vec<Arc<WalletManager>>>,
    reachable: AtomicBool,
    me: Weak<System>,
}

impl System {
    /// Create and register a system for `account`. Its storage lives under
    /// `config.storage_path/<account filesystem id>`.
    pub fn create(
        config: SystemConfig,
        account: Account,
        context: SystemContext,
    ) -> Result<Arc<System>, SystemError> {
        let path = config.storage_path.join(account.filesystem_id());
        ensure_path(&path)?;

        let token = registry::next_token();
        let coordinator = Arc::new(CallbackCoordinator::new(Arc::clone(&context.executor)));
        let system = Arc::new_cyclic(|me| System {
            token,
            account,
            path,
            config,
            listener: context.listener,
            executor: context.executor,
            query: context.query,
            engine: context.engine,
            coordinator,
            metrics: Arc::new(SystemMetrics::new()),
            networks: RwLock::new(Vec::new()),
            managers: RwLock::new(Vec::new()),
            reachable: AtomicBool::new(true),
            me: me.clone(),
        });

        registry::insert(Arc::clone(&system));
        info!(system = %token, path = %system.path.display(), "system created");
        system.announce_system_event(SystemEvent::Created);
        Ok(system)
    }

    pub fn token(&self) -> SystemToken {
        self.token
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn is_mainnet(&self) -> bool {
        self.config.is_mainnet
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &SystemMetrics {
        &self.metrics
    }

    /// Prometheus text for this system, when metrics are enabled.
    pub fn metrics_text(&self) -> Option<String> {
        self.config
            .enable_metrics
            .then(|| self.metrics.gather_text())
    }

    pub(crate) fn engine(&self) -> &Arc<dyn SyncEngine> {
        &self.engine
    }

    pub(crate) fn query(&self) -> &Arc<dyn BlockchainDb> {
        &self.query
    }

    pub(crate) fn coordinator(&self) -> &Arc<CallbackCoordinator> {
        &self.coordinator
    }

    // ── Networks ────────────────────────────────────────────────────────

    /// Start network discovery. Networks are announced as they are found;
    /// a `DiscoveredNetworks` system event closes the pass.
    pub fn configure(&self, app_currencies: Vec<CurrencyModel>) {
        let _span = discovery_span(self.token, self.is_mainnet()).entered();
        info!(app_currencies = app_currencies.len(), "discovering networks");

        let on_network = {
            let me = self.me.clone();
            move |network: Arc<Network>| {
                if let Some(system) = me.upgrade() {
                    system.add_network(network);
                }
            }
        };
        let on_complete = {
            let me = self.me.clone();
            move |networks: Vec<Arc<Network>>| {
                if let Some(system) = me.upgrade() {
                    info!(system = %system.token, networks = networks.len(), "discovery complete");
                    let uids = networks.iter().map(|n| n.uids().to_string()).collect();
                    system.announce_system_event(SystemEvent::DiscoveredNetworks(uids));
                }
            }
        };

        NetworkDiscovery::new(Arc::clone(&self.query), self.is_mainnet(), app_currencies)
            .run(on_network, on_complete);
    }

    fn add_network(&self, network: Arc<Network>) {
        {
            let mut networks = self.networks.write();
            if networks.iter().any(|n| n.uids() == network.uids()) {
                debug!(network = %network.uids(), "network already known");
                return;
            }
            networks.push(Arc::clone(&network));
            self.metrics.networks.set(networks.len() as i64);
        }
        let uids = network.uids().to_string();
        self.announce_network_event(&network, NetworkEvent::Created);
        self.announce_system_event(SystemEvent::NetworkAdded(uids));
    }

    pub fn networks(&self) -> Vec<Arc<Network>> {
        self.networks.read().clone()
    }

    pub fn network_by_uids(&self, uids: &str) -> Option<Arc<Network>> {
        self.networks
            .read()
            .iter()
            .find(|n| n.uids() == uids)
            .cloned()
    }

    /// Re-fetch fee estimates for every known network.
    pub fn update_network_fees(&self, handler: Option<FeeUpdateHandler>) {
        let me = self.me.clone();
        self.query.get_blockchains(
            self.is_mainnet(),
            Box::new(move |result| {
                let Some(system) = me.upgrade() else { return };
                let outcome = match result {
                    Ok(models) => Ok(system.apply_fees(&models)),
                    Err(e) => {
                        warn!(system = %system.token, error = %e, "fee update failed");
                        Err(SystemError::FeesUnavailable)
                    }
                };
                if let Some(handler) = handler {
                    system.executor.execute(Box::new(move || handler(outcome)));
                }
            }),
        );
    }

    fn apply_fees(&self, models: &[walletkit_blockchaindb::Blockchain]) -> Vec<Arc<Network>> {
        let mut updated = Vec::new();
        for model in models {
            let Some(network) = self.network_by_uids(&model.id) else {
                continue;
            };
            let Some(fee_unit) = network.base_unit_for(network.currency()) else {
                continue;
            };
            match network.set_fees(parse_fees(&model.fee_estimates, &fee_unit)) {
                Ok(()) => {
                    self.announce_network_event(&network, NetworkEvent::FeesUpdated);
                    updated.push(network);
                }
                Err(e) => debug!(network = %model.id, error = %e, "fees not updated"),
            }
        }
        updated
    }

    // ── Wallet managers ─────────────────────────────────────────────────

    pub fn managers(&self) -> Vec<Arc<WalletManager>> {
        self.managers.read().clone()
    }

    pub fn manager_by_network(&self, network: &Network) -> Option<Arc<WalletManager>> {
        self.managers
            .read()
            .iter()
            .find(|m| m.network().uids() == network.uids())
            .cloned()
    }

    pub fn manager_by_handle(&self, handle: ManagerHandle) -> Option<Arc<WalletManager>> {
        self.managers
            .read()
            .iter()
            .find(|m| m.handle() == handle)
            .cloned()
    }

    pub(crate) fn remove_manager(&self, handle: ManagerHandle) -> Option<Arc<WalletManager>> {
        let mut managers = self.managers.write();
        let index = managers.iter().position(|m| m.handle() == handle)?;
        let manager = managers.remove(index);
        self.metrics.wallet_managers.set(managers.len() as i64);
        Some(manager)
    }

    /// Create the wallet manager for `network` and register wallets for
    /// `currencies`. Mode and scheme must be supported by the network.
    pub fn create_wallet_manager(
        &self,
        network: &Arc<Network>,
        mode: SyncMode,
        scheme: AddressScheme,
        currencies: &[Currency],
    ) -> Result<Arc<WalletManager>, SystemError> {
        if self.network_by_uids(network.uids()).is_none() {
            return Err(SystemError::UnknownNetwork(network.uids().to_string()));
        }
        if !network.supports_mode(mode) {
            return Err(SystemError::UnsupportedMode {
                network: network.uids().to_string(),
                mode,
            });
        }
        if !network.supports_address_scheme(scheme) {
            return Err(SystemError::UnsupportedAddressScheme {
                network: network.uids().to_string(),
                scheme,
            });
        }

        let spec = ManagerSpec {
            account: self.account.clone(),
            network_uids: network.uids().to_string(),
            network_name: network.name().to_string(),
            is_mainnet: network.is_mainnet(),
            currency: network.currency().clone(),
            height: network.height(),
            confirmations_until_final: network.confirmations_until_final(),
            mode,
            scheme,
            storage_path: self.path.clone(),
        };

        // Held across engine creation so the engine's `Created` event cannot
        // be dispatched before the manager is registered.
        let manager = {
            let mut managers = self.managers.write();
            if managers.iter().any(|m| m.network().uids() == network.uids()) {
                return Err(SystemError::ManagerExists(network.uids().to_string()));
            }
            let handle = self
                .engine
                .create_manager(&spec, EngineContext::new(self.token))?;
            let manager = Arc::new(WalletManager::new(
                handle,
                &spec,
                Arc::clone(network),
                Arc::clone(&self.engine),
                Arc::clone(&self.coordinator),
                Arc::clone(&self.metrics),
            ));
            managers.push(Arc::clone(&manager));
            self.metrics.wallet_managers.set(managers.len() as i64);
            manager
        };

        info!(system = %self.token, manager = %manager.handle(), network = %network.uids(), %mode, %scheme, "wallet manager created");
        manager.set_network_reachable(self.is_reachable());

        for currency in currencies {
            if let Err(e) = manager.register_wallet_for(currency) {
                warn!(manager = %manager.handle(), currency = %currency.uids(), error = %e, "wallet not registered");
            }
        }
        Ok(manager)
    }

    pub fn set_network_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
        for manager in self.managers() {
            manager.set_network_reachable(reachable);
        }
    }

    pub fn connect_all(&self) {
        for manager in self.managers() {
            manager.connect();
        }
    }

    pub fn disconnect_all(&self) {
        for manager in self.managers() {
            manager.disconnect();
        }
    }

    // ── Storage ─────────────────────────────────────────────────────────

    /// Stop every manager, unregister the system and delete its storage.
    pub fn wipe(system: &Arc<System>) -> Result<(), SystemError> {
        for manager in system.managers() {
            manager.disconnect();
            manager.stop();
        }
        registry::remove(system.token, system.config.retain_inactive_systems);
        info!(system = %system.token, path = %system.path.display(), "system wiped");
        delete_recursively(&system.path)?;
        Ok(())
    }

    /// Wipe every live system under `storage_path` and delete all other
    /// storage there, except what belongs to `exempt`.
    pub fn wipe_all(storage_path: &Path, exempt: &[Arc<System>]) -> Result<Vec<PathBuf>, SystemError> {
        let exempt_tokens: Vec<SystemToken> = exempt.iter().map(|s| s.token).collect();
        for token in registry::active_tokens() {
            if exempt_tokens.contains(&token) {
                continue;
            }
            if let Some(system) = registry::lookup(token) {
                if system.path.starts_with(storage_path) {
                    System::wipe(&system)?;
                }
            }
        }
        let exempt_paths: Vec<PathBuf> = exempt.iter().map(|s| s.path.clone()).collect();
        Ok(wipe_all_except(storage_path, &exempt_paths)?)
    }

    /// Where the engine keeps the data of one network.
    pub fn network_path(&self, network: &Network) -> PathBuf {
        self.path.join(network.uids())
    }

    /// Delete one network's storage. Refused while the network has a manager.
    pub fn wipe_network(&self, network: &Network) -> Result<(), SystemError> {
        if self.manager_by_network(network).is_some() {
            return Err(SystemError::NetworkInUse(network.uids().to_string()));
        }
        delete_recursively(&self.network_path(network))?;
        Ok(())
    }

    pub fn migrate_required(&self, network: &Network) -> bool {
        self.engine.migrate_required(network.uids())
    }

    /// Import legacy records into the engine's storage. The first bad blob
    /// aborts the import; peers without a timestamp are skipped.
    pub fn migrate_storage(
        &self,
        network: &Network,
        transactions: &[TransactionBlob],
        blocks: &[BlockBlob],
        peers: &[PeerBlob],
    ) -> Result<(), SystemError> {
        if !self.migrate_required(network) {
            return Err(MigrateError::Invalid.into());
        }
        let mut migrator = self.engine.create_migrator(network.uids(), &self.path)?;
        for blob in transactions {
            migrator.put_transaction(blob)?;
        }
        for blob in blocks {
            migrator.put_block(blob)?;
        }
        for blob in peers {
            if blob.timestamp.is_none() {
                debug!(address = blob.address, port = blob.port, "peer without timestamp skipped");
                continue;
            }
            migrator.put_peer(blob)?;
        }
        info!(
            network = %network.uids(),
            transactions = transactions.len(),
            blocks = blocks.len(),
            "legacy storage migrated"
        );
        Ok(())
    }

    // ── Announcements ───────────────────────────────────────────────────

    fn announce<F>(&self, deliver: F)
    where
        F: FnOnce(&dyn SystemListener, &Arc<System>) + Send + 'static,
    {
        let Some(system) = self.me.upgrade() else {
            return;
        };
        let listener = Arc::clone(&self.listener);
        self.executor
            .execute(Box::new(move || deliver(listener.as_ref(), &system)));
    }

    pub(crate) fn announce_system_event(&self, event: SystemEvent) {
        self.announce(move |listener, system| listener.handle_system_event(system, event));
    }

    pub(crate) fn announce_network_event(&self, network: &Arc<Network>, event: NetworkEvent) {
        let network = Arc::clone(network);
        self.announce(move |listener, system| {
            listener.handle_network_event(system, &network, event)
        });
    }

    pub(crate) fn announce_manager_event(&self, manager: &Arc<WalletManager>, event: WalletManagerEvent) {
        let manager = Arc::clone(manager);
        self.announce(move |listener, system| {
            listener.handle_manager_event(system, &manager, event)
        });
    }

    pub(crate) fn announce_wallet_event(
        &self,
        manager: &Arc<WalletManager>,
        wallet: &Arc<Wallet>,
        event: WalletEvent,
    ) {
        let manager = Arc::clone(manager);
        let wallet = Arc::clone(wallet);
        self.announce(move |listener, system| {
            listener.handle_wallet_event(system, &manager, &wallet, event)
        });
    }

    pub(crate) fn announce_transfer_event(
        &self,
        manager: &Arc<WalletManager>,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        event: TransferEvent,
    ) {
        let manager = Arc::clone(manager);
        let wallet = Arc::clone(wallet);
        let transfer = Arc::clone(transfer);
        self.announce(move |listener, system| {
            listener.handle_transfer_event(system, &manager, &wallet, &transfer, event)
        });
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("token", &self.token)
            .field("account", &self.account.uids())
            .field("path", &self.path)
            .finish()
    }
}
