//! Harness shared by the integration tests: a system wired to nullable
//! collaborators and a listener that forwards every event to a channel.

#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use walletkit_blockchaindb::BlockchainDb;
use walletkit_nullables::{InlineExecutor, NullBlockchainDb, NullSyncEngine};
use walletkit_system::{
    Account, Network, NetworkEvent, System, SystemConfig, SystemContext, SystemEvent, SystemListener,
    SyncEngine, Transfer, TransferEvent, Wallet, WalletEvent, WalletManager, WalletManagerEvent,
};
use walletkit_types::{ManagerHandle, TransferHandle, WalletHandle};

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub enum Seen {
    System(SystemEvent),
    Network(String, NetworkEvent),
    Manager(ManagerHandle, WalletManagerEvent),
    Wallet(WalletHandle, WalletEvent),
    Transfer(TransferHandle, TransferEvent),
}

pub struct ChannelListener {
    tx: Mutex<Sender<Seen>>,
}

impl ChannelListener {
    fn send(&self, seen: Seen) {
        let _ = self.tx.lock().unwrap().send(seen);
    }
}

impl SystemListener for ChannelListener {
    fn handle_system_event(&self, _system: &Arc<System>, event: SystemEvent) {
        self.send(Seen::System(event));
    }

    fn handle_network_event(&self, _system: &Arc<System>, network: &Arc<Network>, event: NetworkEvent) {
        self.send(Seen::Network(network.uids().to_string(), event));
    }

    fn handle_manager_event(&self, _system: &Arc<System>, manager: &Arc<WalletManager>, event: WalletManagerEvent) {
        self.send(Seen::Manager(manager.handle(), event));
    }

    fn handle_wallet_event(
        &self,
        _system: &Arc<System>,
        _manager: &Arc<WalletManager>,
        wallet: &Arc<Wallet>,
        event: WalletEvent,
    ) {
        self.send(Seen::Wallet(wallet.handle(), event));
    }

    fn handle_transfer_event(
        &self,
        _system: &Arc<System>,
        _manager: &Arc<WalletManager>,
        _wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        event: TransferEvent,
    ) {
        self.send(Seen::Transfer(transfer.handle(), event));
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub system: Arc<System>,
    pub query: Arc<NullBlockchainDb>,
    pub engine: Arc<NullSyncEngine>,
    pub events: Receiver<Seen>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_query(NullBlockchainDb::new())
    }

    pub fn with_query(query: NullBlockchainDb) -> Self {
        Self::build(query, true)
    }

    pub fn build(query: NullBlockchainDb, retain_inactive_systems: bool) -> Self {
        walletkit_utils::init_tracing();
        let dir = tempfile::tempdir().expect("temp dir");
        let config = SystemConfig {
            storage_path: dir.path().to_path_buf(),
            retain_inactive_systems,
            ..SystemConfig::default()
        };
        let (tx, events) = mpsc::channel();
        let query = Arc::new(query);
        let engine = Arc::new(NullSyncEngine::new());
        let system = System::create(
            config,
            Account::from_uids("5766b9fa-e9aa-4b6d-9b77-b5f1136e5e96", 1_514_764_800),
            SystemContext {
                listener: Arc::new(ChannelListener { tx: Mutex::new(tx) }),
                executor: Arc::new(InlineExecutor::new()),
                query: Arc::clone(&query) as Arc<dyn BlockchainDb>,
                engine: Arc::clone(&engine) as Arc<dyn SyncEngine>,
            },
        )
        .expect("system");
        Self {
            dir,
            system,
            query,
            engine,
            events,
        }
    }

    /// Receive events until one matches and return it.
    pub fn wait_for(&self, predicate: impl Fn(&Seen) -> bool) -> Seen {
        let deadline = Instant::now() + TIMEOUT;
        let mut skipped = Vec::new();
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(left) {
                Ok(seen) if predicate(&seen) => return seen,
                Ok(seen) => skipped.push(seen),
                Err(_) => panic!("timed out; saw {skipped:?}"),
            }
        }
    }

    pub fn network(&self, uids: &str) -> Arc<Network> {
        self.system.network_by_uids(uids).expect("network discovered")
    }

    /// Discover networks and wait for the pass to finish.
    pub fn configure(&self) -> Vec<String> {
        self.system.configure(Vec::new());
        match self.wait_for(|seen| matches!(seen, Seen::System(SystemEvent::DiscoveredNetworks(_)))) {
            Seen::System(SystemEvent::DiscoveredNetworks(uids)) => uids,
            other => unreachable!("{other:?}"),
        }
    }

    /// Create a manager for `uids` with its primary wallet, and wait for the
    /// wallet to be added.
    pub fn manager_with_wallet(
        &self,
        uids: &str,
        mode: walletkit_types::SyncMode,
        scheme: walletkit_types::AddressScheme,
    ) -> (Arc<WalletManager>, Arc<Wallet>) {
        let network = self.network(uids);
        let manager = self
            .system
            .create_wallet_manager(&network, mode, scheme, &[network.currency().clone()])
            .expect("manager");
        self.wait_for(|seen| matches!(seen, Seen::Manager(_, WalletManagerEvent::WalletAdded(_))));
        let wallet = manager.primary_wallet().expect("primary wallet");
        (manager, wallet)
    }
}
