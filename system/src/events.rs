//! Events delivered to the application.
//!
//! Every listener call happens on the system's executor, in the order the
//! system processed the underlying engine events.

use std::sync::Arc;

use walletkit_types::{
    Amount, ManagerHandle, SyncDepth, SyncStoppedReason, TransferFeeBasis, TransferHandle,
    TransferState, WalletHandle, WalletManagerState, WalletState,
};

use crate::network::Network;
use crate::system::System;
use crate::transfer::Transfer;
use crate::wallet::Wallet;
use crate::wallet_manager::WalletManager;

#[derive(Clone, Debug, PartialEq)]
pub enum SystemEvent {
    Created,
    /// Uids of the added network.
    NetworkAdded(String),
    ManagerAdded(ManagerHandle),
    /// Uids of every network found by a discovery pass.
    DiscoveredNetworks(Vec<String>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum NetworkEvent {
    Created,
    FeesUpdated,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WalletManagerEvent {
    Created,
    Changed {
        old: WalletManagerState,
        new: WalletManagerState,
    },
    Deleted,
    WalletAdded(WalletHandle),
    WalletChanged(WalletHandle),
    WalletDeleted(WalletHandle),
    SyncStarted,
    SyncProgress {
        timestamp: Option<u64>,
        percent_complete: f32,
    },
    SyncEnded(SyncStoppedReason),
    SyncRecommended(SyncDepth),
    BlockUpdated(u64),
}

#[derive(Clone, Debug, PartialEq)]
pub enum WalletEvent {
    Created,
    Changed { old: WalletState, new: WalletState },
    Deleted,
    TransferAdded(TransferHandle),
    TransferChanged(TransferHandle),
    TransferSubmitted(TransferHandle),
    TransferDeleted(TransferHandle),
    BalanceUpdated(Amount),
    FeeBasisUpdated(TransferFeeBasis),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    Created,
    Changed { old: TransferState, new: TransferState },
    Deleted,
}

/// Receives every event of one system. All methods default to no-ops.
pub trait SystemListener: Send + Sync {
    fn handle_system_event(&self, _system: &Arc<System>, _event: SystemEvent) {}

    fn handle_network_event(&self, _system: &Arc<System>, _network: &Arc<Network>, _event: NetworkEvent) {}

    fn handle_manager_event(
        &self,
        _system: &Arc<System>,
        _manager: &Arc<WalletManager>,
        _event: WalletManagerEvent,
    ) {
    }

    fn handle_wallet_event(
        &self,
        _system: &Arc<System>,
        _manager: &Arc<WalletManager>,
        _wallet: &Arc<Wallet>,
        _event: WalletEvent,
    ) {
    }

    fn handle_transfer_event(
        &self,
        _system: &Arc<System>,
        _manager: &Arc<WalletManager>,
        _wallet: &Arc<Wallet>,
        _transfer: &Arc<Transfer>,
        _event: TransferEvent,
    ) {
    }
}
