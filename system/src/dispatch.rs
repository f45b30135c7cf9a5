//! Engine lifecycle events, handled on the event pump.
//!
//! Each handler re-resolves the system from its token and the entities from
//! their handles, updates their state, and announces the application event
//! on the system's executor. Anything that no longer resolves is dropped.

use std::sync::Arc;

use tracing::{debug, warn};
use walletkit_types::{
    ManagerHandle, SystemToken, TransferHandle, TransferState, WalletHandle, WalletManagerState,
    WalletState,
};

use crate::engine::{EngineManagerEvent, EngineTransferEvent, EngineWalletEvent};
use crate::events::{SystemEvent, TransferEvent, WalletEvent, WalletManagerEvent};
use crate::registry;
use crate::system::System;
use crate::tracing_spans::dispatch_span;
use crate::wallet::Wallet;
use crate::wallet_manager::WalletManager;

fn system_for(token: SystemToken) -> Option<Arc<System>> {
    let system = registry::lookup(token);
    if system.is_none() {
        debug!(system = %token, "event for unknown system dropped");
    }
    system
}

fn manager_for(system: &System, handle: ManagerHandle) -> Option<Arc<WalletManager>> {
    let manager = system.manager_by_handle(handle);
    if manager.is_none() {
        warn!(system = %system.token(), manager = %handle, "event for unknown manager dropped");
        system.metrics().events_dropped.inc();
    }
    manager
}

fn wallet_for(system: &System, manager: &WalletManager, handle: WalletHandle) -> Option<Arc<Wallet>> {
    let wallet = manager.wallet_by_handle(handle);
    if wallet.is_none() {
        warn!(manager = %manager.handle(), wallet = %handle, "event for unknown wallet dropped");
        system.metrics().events_dropped.inc();
    }
    wallet
}

pub(crate) fn handle_manager_event(token: SystemToken, handle: ManagerHandle, event: EngineManagerEvent) {
    let Some(system) = system_for(token) else { return };
    let _span = dispatch_span(token, "manager").entered();
    let Some(manager) = manager_for(&system, handle) else { return };

    let announced = match event {
        EngineManagerEvent::Created => {
            system.announce_manager_event(&manager, WalletManagerEvent::Created);
            system.announce_system_event(SystemEvent::ManagerAdded(handle));
            system.metrics().events_dispatched.inc();
            return;
        }
        EngineManagerEvent::Changed { new, .. } => match manager.set_state(new.clone()) {
            Some(old) => WalletManagerEvent::Changed { old, new },
            None => return,
        },
        EngineManagerEvent::Deleted => {
            manager.set_state(WalletManagerState::Deleted);
            system.remove_manager(handle);
            system.engine().release_manager(handle);
            WalletManagerEvent::Deleted
        }
        EngineManagerEvent::WalletAdded(w) => {
            let Some(wallet) = wallet_for(&system, &manager, w) else { return };
            WalletManagerEvent::WalletAdded(wallet.handle())
        }
        EngineManagerEvent::WalletChanged(w) => {
            let Some(wallet) = wallet_for(&system, &manager, w) else { return };
            WalletManagerEvent::WalletChanged(wallet.handle())
        }
        // The wallet may already be gone by the time this arrives.
        EngineManagerEvent::WalletDeleted(w) => WalletManagerEvent::WalletDeleted(w),
        EngineManagerEvent::SyncStarted => WalletManagerEvent::SyncStarted,
        EngineManagerEvent::SyncContinues {
            timestamp,
            percent_complete,
        } => WalletManagerEvent::SyncProgress {
            timestamp,
            percent_complete,
        },
        EngineManagerEvent::SyncStopped(reason) => WalletManagerEvent::SyncEnded(reason),
        EngineManagerEvent::SyncRecommended(depth) => WalletManagerEvent::SyncRecommended(depth),
        EngineManagerEvent::BlockHeightUpdated(height) => {
            manager.network().set_height(height);
            WalletManagerEvent::BlockUpdated(height)
        }
    };

    system.announce_manager_event(&manager, announced);
    system.metrics().events_dispatched.inc();
}

pub(crate) fn handle_wallet_event(
    token: SystemToken,
    manager_handle: ManagerHandle,
    handle: WalletHandle,
    event: EngineWalletEvent,
) {
    let Some(system) = system_for(token) else { return };
    let _span = dispatch_span(token, "wallet").entered();

    // Estimates complete even when the wallet or its manager is already gone.
    let event = match event {
        EngineWalletEvent::FeeBasisEstimated { cookie, result } => {
            system.coordinator().complete_fee(cookie, result);
            return;
        }
        other => other,
    };

    let Some(manager) = manager_for(&system, manager_handle) else { return };

    if let EngineWalletEvent::Created { currency_uids } = &event {
        match manager.get_or_insert_wallet(handle, currency_uids) {
            Some((wallet, true)) => {
                system.announce_wallet_event(&manager, &wallet, WalletEvent::Created);
                system.metrics().events_dispatched.inc();
            }
            Some((_, false)) => debug!(wallet = %handle, "wallet already known"),
            None => {
                warn!(wallet = %handle, currency = %currency_uids, "wallet for unknown currency dropped");
                system.metrics().events_dropped.inc();
            }
        }
        return;
    }

    let Some(wallet) = wallet_for(&system, &manager, handle) else { return };

    let announced = match event {
        EngineWalletEvent::Changed { new, .. } => match wallet.set_state(new) {
            Some(old) => WalletEvent::Changed { old, new },
            None => return,
        },
        EngineWalletEvent::Deleted => {
            wallet.set_state(WalletState::Deleted);
            manager.remove_wallet(handle);
            system.engine().release_wallet(handle);
            WalletEvent::Deleted
        }
        EngineWalletEvent::TransferAdded(t) => WalletEvent::TransferAdded(t),
        EngineWalletEvent::TransferChanged(t) => WalletEvent::TransferChanged(t),
        EngineWalletEvent::TransferSubmitted(t) => WalletEvent::TransferSubmitted(t),
        EngineWalletEvent::TransferDeleted(t) => WalletEvent::TransferDeleted(t),
        EngineWalletEvent::BalanceUpdated(balance) => {
            wallet.set_balance(balance.clone());
            WalletEvent::BalanceUpdated(balance)
        }
        EngineWalletEvent::FeeBasisUpdated(basis) => {
            wallet.set_default_fee_basis(basis.clone());
            WalletEvent::FeeBasisUpdated(basis)
        }
        EngineWalletEvent::Created { .. } | EngineWalletEvent::FeeBasisEstimated { .. } => return,
    };

    system.announce_wallet_event(&manager, &wallet, announced);
    system.metrics().events_dispatched.inc();
}

pub(crate) fn handle_transfer_event(
    token: SystemToken,
    manager_handle: ManagerHandle,
    wallet_handle: WalletHandle,
    handle: TransferHandle,
    event: EngineTransferEvent,
) {
    let Some(system) = system_for(token) else { return };
    let _span = dispatch_span(token, "transfer").entered();
    let Some(manager) = manager_for(&system, manager_handle) else { return };
    let Some(wallet) = wallet_for(&system, &manager, wallet_handle) else { return };

    let (transfer, announced) = match event {
        EngineTransferEvent::Created(record) => {
            let (transfer, created) = wallet.get_or_insert_transfer(handle, record);
            if !created {
                debug!(transfer = %handle, "transfer already known");
                return;
            }
            (transfer, TransferEvent::Created)
        }
        EngineTransferEvent::Changed {
            new,
            confirmed_fee_basis,
            ..
        } => {
            let Some(transfer) = wallet.transfer_by_handle(handle) else {
                warn!(transfer = %handle, "change for unknown transfer dropped");
                system.metrics().events_dropped.inc();
                return;
            };
            // Applied first so an inclusion picks up the fee actually paid.
            if let Some(basis) = confirmed_fee_basis {
                transfer.set_confirmed_fee_basis(basis);
            }
            match transfer.set_state(new) {
                Some(old) => {
                    let new = transfer.state();
                    (transfer, TransferEvent::Changed { old, new })
                }
                None => return,
            }
        }
        EngineTransferEvent::Deleted => {
            let Some(transfer) = wallet.remove_transfer(handle) else {
                warn!(transfer = %handle, "delete for unknown transfer dropped");
                system.metrics().events_dropped.inc();
                return;
            };
            transfer.set_state(TransferState::Deleted);
            system.engine().release_transfer(handle);
            (transfer, TransferEvent::Deleted)
        }
    };

    system.announce_transfer_event(&manager, &wallet, &transfer, announced);
    system.metrics().events_dispatched.inc();
}
