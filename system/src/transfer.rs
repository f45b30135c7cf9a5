//! Transfers.

use std::fmt;

use parking_lot::RwLock;
use tracing::debug;
use walletkit_types::{
    Address, Amount, TransferConfirmation, TransferDirection, TransferFeeBasis, TransferHandle,
    TransferState, Unit, WalletHandle,
};

use crate::engine::TransferRecord;

/// One value movement tracked by a wallet. Created and updated only by
/// engine events.
pub struct Transfer {
    handle: TransferHandle,
    wallet: WalletHandle,
    source: Option<Address>,
    target: Option<Address>,
    amount: Amount,
    direction: TransferDirection,
    fee_unit: Unit,
    attributes: Vec<(String, String)>,
    hash: RwLock<Option<String>>,
    estimated_fee_basis: RwLock<Option<TransferFeeBasis>>,
    confirmed_fee_basis: RwLock<Option<TransferFeeBasis>>,
    state: RwLock<TransferState>,
}

impl Transfer {
    pub(crate) fn from_record(
        handle: TransferHandle,
        wallet: WalletHandle,
        fee_unit: Unit,
        record: TransferRecord,
    ) -> Self {
        let transfer = Self {
            handle,
            wallet,
            source: record.source,
            target: record.target,
            amount: record.amount,
            direction: record.direction,
            fee_unit,
            attributes: record.attributes,
            hash: RwLock::new(record.hash),
            estimated_fee_basis: RwLock::new(record.estimated_fee_basis),
            confirmed_fee_basis: RwLock::new(record.confirmed_fee_basis),
            state: RwLock::new(TransferState::Created),
        };
        transfer.set_state(record.state);
        transfer
    }

    pub fn handle(&self) -> TransferHandle {
        self.handle
    }

    pub fn wallet(&self) -> WalletHandle {
        self.wallet
    }

    pub fn source(&self) -> Option<&Address> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&Address> {
        self.target.as_ref()
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    /// Signed from the wallet's point of view: negative when sent, zero
    /// when recovered.
    pub fn amount_directed(&self) -> Amount {
        match self.direction {
            TransferDirection::Sent => self.amount.negate(),
            TransferDirection::Received => self.amount.clone(),
            TransferDirection::Recovered => Amount::create_i64(0, self.amount.unit().clone()),
        }
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn unit(&self) -> &Unit {
        self.amount.unit()
    }

    pub fn unit_for_fee(&self) -> &Unit {
        &self.fee_unit
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn hash(&self) -> Option<String> {
        self.hash.read().clone()
    }

    pub fn estimated_fee_basis(&self) -> Option<TransferFeeBasis> {
        self.estimated_fee_basis.read().clone()
    }

    pub fn confirmed_fee_basis(&self) -> Option<TransferFeeBasis> {
        self.confirmed_fee_basis.read().clone()
    }

    pub(crate) fn set_confirmed_fee_basis(&self, basis: TransferFeeBasis) {
        *self.confirmed_fee_basis.write() = Some(basis);
    }

    /// Fee from the confirmed basis when present, else the estimated one.
    pub fn fee(&self) -> Option<Amount> {
        self.confirmed_fee_basis()
            .or_else(|| self.estimated_fee_basis())
            .and_then(|basis| basis.fee())
    }

    pub fn state(&self) -> TransferState {
        self.state.read().clone()
    }

    pub fn confirmation(&self) -> Option<TransferConfirmation> {
        match &*self.state.read() {
            TransferState::Included(confirmation) => Some(confirmation.clone()),
            _ => None,
        }
    }

    /// Apply `next` if it moves the transfer forwards. `Included` may be
    /// re-applied with refined confirmation details; any other repeat is
    /// ignored. Returns the replaced state when applied.
    pub(crate) fn set_state(&self, next: TransferState) -> Option<TransferState> {
        let next = match next {
            TransferState::Included(mut confirmation) => {
                if confirmation.fee.is_none() {
                    confirmation.fee = self.fee();
                }
                TransferState::Included(confirmation)
            }
            other => other,
        };

        let mut state = self.state.write();
        if !state.can_transition_to(&next) {
            debug!(transfer = %self.handle, from = ?*state, to = ?next, "stale transfer state ignored");
            return None;
        }
        Some(std::mem::replace(&mut *state, next))
    }
}

impl PartialEq for Transfer {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Transfer {}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("handle", &self.handle)
            .field("direction", &self.direction)
            .field("amount", &self.amount)
            .field("state", &*self.state.read())
            .finish()
    }
}
