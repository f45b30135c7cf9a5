//! Parse and construction errors for the value types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("unknown sync mode: {0}")]
    UnknownSyncMode(String),

    #[error("unknown address scheme: {0}")]
    UnknownAddressScheme(String),
}
