//! Value types shared across walletkit.
//!
//! This crate defines the leaf data model every other crate builds on:
//! currencies and their units, currency-aware amounts, network fees,
//! opaque engine handles, and the lifecycle state enums for managers,
//! wallets and transfers.

pub mod address;
pub mod amount;
pub mod currency;
pub mod error;
pub mod estimate;
pub mod fee;
pub mod handle;
pub mod state;
pub mod unit;

pub use address::{Address, AddressScheme, SyncMode};
pub use amount::Amount;
pub use currency::Currency;
pub use error::TypesError;
pub use estimate::{FeeEstimationError, LimitEstimationError};
pub use fee::{NetworkFee, TransferFeeBasis};
pub use handle::{Cookie, ManagerHandle, SystemToken, TransferHandle, WalletHandle};
pub use state::{
    SyncDepth, SyncStoppedReason, TransferConfirmation, TransferDirection, TransferState,
    TransferSubmitError, WalletManagerDisconnectReason, WalletManagerState, WalletState,
};
pub use unit::Unit;
