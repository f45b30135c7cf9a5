use thiserror::Error;

use walletkit_blockchaindb::QueryError;
use walletkit_types::{AddressScheme, SyncMode};

use crate::engine::{EngineError, MigrateError};

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("mode {mode} is not supported by network {network}")]
    UnsupportedMode { network: String, mode: SyncMode },

    #[error("address scheme {scheme} is not supported by network {network}")]
    UnsupportedAddressScheme {
        network: String,
        scheme: AddressScheme,
    },

    #[error("currency {currency} is not part of network {network}")]
    UnsupportedCurrency { network: String, currency: String },

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("network {0} already has a wallet manager")]
    ManagerExists(String),

    #[error("network {0} has an active wallet manager")]
    NetworkInUse(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("fee list must not be empty")]
    EmptyFees,

    #[error("network fees unavailable")]
    FeesUnavailable,

    #[error("config error: {0}")]
    Config(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("migration error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
