//! Terminal outcomes of fee and limit estimation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FeeEstimationError {
    #[error("fee estimation service unavailable")]
    ServiceUnavailable,

    #[error("fee estimation service failed")]
    ServiceFailure,

    #[error("insufficient funds to cover the fee")]
    InsufficientFunds,
}

/// Exactly one of these is reported for a failed limit estimation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LimitEstimationError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("fee estimation service unavailable")]
    ServiceUnavailable,

    #[error("fee estimation service failed")]
    ServiceFailure,
}

impl From<FeeEstimationError> for LimitEstimationError {
    fn from(e: FeeEstimationError) -> Self {
        match e {
            FeeEstimationError::ServiceUnavailable => Self::ServiceUnavailable,
            FeeEstimationError::ServiceFailure => Self::ServiceFailure,
            FeeEstimationError::InsufficientFunds => Self::InsufficientFunds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_errors_map_one_to_one() {
        assert_eq!(
            LimitEstimationError::from(FeeEstimationError::ServiceUnavailable),
            LimitEstimationError::ServiceUnavailable
        );
        assert_eq!(
            LimitEstimationError::from(FeeEstimationError::ServiceFailure),
            LimitEstimationError::ServiceFailure
        );
        assert_eq!(
            LimitEstimationError::from(FeeEstimationError::InsufficientFunds),
            LimitEstimationError::InsufficientFunds
        );
    }
}
