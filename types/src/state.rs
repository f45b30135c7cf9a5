//! Lifecycle state enums for wallet managers, wallets and transfers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Amount;

/// Why a wallet manager disconnected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletManagerDisconnectReason {
    Requested,
    Unknown,
    Posix { errno: i32, message: Option<String> },
}

/// Connection state of a wallet manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletManagerState {
    Created,
    Disconnected(WalletManagerDisconnectReason),
    Connected,
    Syncing,
    Deleted,
}

impl WalletManagerState {
    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// `Created -> {Connected, Syncing, Disconnected}`, `Connected <-> Syncing`,
    /// `{Connected, Syncing} -> Disconnected`, `Disconnected -> {Connected, Syncing}`,
    /// anything but `Deleted` -> `Deleted`.
    pub fn can_transition_to(&self, next: &WalletManagerState) -> bool {
        use WalletManagerState::*;
        match (self, next) {
            (Deleted, _) => false,
            (_, Deleted) => true,
            (Created, Connected | Syncing | Disconnected(_)) => true,
            (Connected, Syncing | Disconnected(_)) => true,
            (Syncing, Connected | Disconnected(_)) => true,
            (Disconnected(_), Connected | Syncing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WalletManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Disconnected(reason) => write!(f, "disconnected({reason:?})"),
            Self::Connected => write!(f, "connected"),
            Self::Syncing => write!(f, "syncing"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Why a sync stopped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStoppedReason {
    Complete,
    Requested,
    Unknown,
    Posix { errno: i32, message: Option<String> },
}

/// How far back a (re)sync should reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncDepth {
    FromLastConfirmedSend,
    FromLastTrustedBlock,
    FromCreation,
}

/// Wallets have no intermediate states; balance changes happen in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletState {
    Created,
    Deleted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    Sent,
    Received,
    /// Sent to self.
    Recovered,
}

/// Details of an included (confirmed) transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferConfirmation {
    pub block_number: u64,
    pub transaction_index: u64,
    pub timestamp: u64,
    pub success: bool,
    pub error: Option<String>,
    pub fee: Option<Amount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferSubmitError {
    Unknown,
    Posix { errno: i32, message: Option<String> },
}

/// Lifecycle state of a transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Included(TransferConfirmation),
    Errored(TransferSubmitError),
    Deleted,
}

impl TransferState {
    /// Position in the forward-only lifecycle. `Included` and `Errored`
    /// share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Signed => 1,
            Self::Submitted => 2,
            Self::Included(_) | Self::Errored(_) => 3,
            Self::Deleted => 4,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Re-entering the same rank is permitted for `Included` (confirmation
    /// details may be refined). `Errored -> Submitted` is the one allowed
    /// step backwards, for resubmission.
    pub fn can_transition_to(&self, next: &TransferState) -> bool {
        match (self, next) {
            (Self::Deleted, _) => false,
            (Self::Errored(_), Self::Submitted) => true,
            (Self::Included(_), Self::Included(_)) => true,
            _ => next.rank() > self.rank(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_transitions() {
        use WalletManagerState::*;
        let requested = Disconnected(WalletManagerDisconnectReason::Requested);

        assert!(Created.can_transition_to(&Connected));
        assert!(Created.can_transition_to(&Syncing));
        assert!(Connected.can_transition_to(&Syncing));
        assert!(Syncing.can_transition_to(&Connected));
        assert!(Syncing.can_transition_to(&requested));
        assert!(requested.can_transition_to(&Connected));
        assert!(requested.can_transition_to(&Deleted));

        assert!(!Connected.can_transition_to(&Created));
        assert!(!Deleted.can_transition_to(&Connected));
        assert!(!Syncing.can_transition_to(&Syncing));
    }

    #[test]
    fn transfer_states_only_move_forward() {
        let included = TransferState::Included(TransferConfirmation {
            block_number: 10,
            transaction_index: 1,
            timestamp: 1_600_000_000,
            success: true,
            error: None,
            fee: None,
        });

        assert!(TransferState::Created.can_transition_to(&TransferState::Signed));
        assert!(TransferState::Signed.can_transition_to(&TransferState::Submitted));
        assert!(TransferState::Submitted.can_transition_to(&included));
        assert!(included.can_transition_to(&included));
        assert!(included.can_transition_to(&TransferState::Deleted));

        assert!(!included.can_transition_to(&TransferState::Submitted));
        assert!(!TransferState::Submitted.can_transition_to(&TransferState::Created));
        assert!(!TransferState::Deleted.can_transition_to(&TransferState::Created));
    }

    #[test]
    fn errored_transfer_may_be_resubmitted() {
        let errored = TransferState::Errored(TransferSubmitError::Unknown);
        assert!(errored.can_transition_to(&TransferState::Submitted));
        assert!(!errored.can_transition_to(&TransferState::Signed));
    }
}
