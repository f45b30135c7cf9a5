//! Remote blockchain query service.
//!
//! The service supplies blockchain metadata, per-chain currency lists,
//! transaction history and fee estimates. Every request is asynchronous and
//! finishes by invoking a data-or-error [`Completion`] exactly once.

pub mod client;
mod de;
pub mod error;
pub mod models;

pub use client::{BlockchainDb, Completion, HttpBlockchainDb, TransactionQuery};
pub use error::QueryError;
pub use models::{
    AmountModel, Blockchain, BlockchainFee, CurrencyDenomination, CurrencyModel, EthGasEstimate,
    EthToken, Transaction, TransferModel,
};
