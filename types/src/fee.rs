//! Network fees and transfer fee bases.

use serde::{Deserialize, Serialize};

use crate::Amount;

/// The price per cost factor that achieves a given confirmation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkFee {
    confirmation_time_ms: u64,
    price_per_cost_factor: Amount,
}

impl NetworkFee {
    pub fn new(confirmation_time_ms: u64, price_per_cost_factor: Amount) -> Self {
        Self {
            confirmation_time_ms,
            price_per_cost_factor,
        }
    }

    pub fn confirmation_time_ms(&self) -> u64 {
        self.confirmation_time_ms
    }

    pub fn price_per_cost_factor(&self) -> &Amount {
        &self.price_per_cost_factor
    }
}

/// The agreed price and cost factor used to compute a transfer's fee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferFeeBasis {
    price_per_cost_factor: Amount,
    cost_factor: f64,
}

impl TransferFeeBasis {
    pub fn new(price_per_cost_factor: Amount, cost_factor: f64) -> Self {
        Self {
            price_per_cost_factor,
            cost_factor,
        }
    }

    pub fn price_per_cost_factor(&self) -> &Amount {
        &self.price_per_cost_factor
    }

    pub fn cost_factor(&self) -> f64 {
        self.cost_factor
    }

    /// Total fee: price times cost factor, in the price's unit.
    pub fn fee(&self) -> Option<Amount> {
        self.price_per_cost_factor.mul_f64(self.cost_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Currency, Unit};
    use num_bigint::BigInt;

    fn gwei() -> Unit {
        let eth = Currency::new("ethereum-mainnet:__native__", "Ethereum", "eth", "native", None);
        let wei = Unit::base(eth, "ethereum-mainnet:__native__:wei", "Wei", "WEI");
        Unit::derived(&wei, "ethereum-mainnet:__native__:gwei", "Gwei", "GWEI", 9)
    }

    #[test]
    fn fee_is_price_times_cost_factor() {
        let basis = TransferFeeBasis::new(Amount::create_i64(20, gwei()), 21_000.0);
        let fee = basis.fee().unwrap();
        assert_eq!(fee.value(), &BigInt::from(420_000_000_000_000u64));
    }

    #[test]
    fn network_fee_equality_uses_both_fields() {
        let a = NetworkFee::new(600_000, Amount::create_i64(1, gwei()));
        let b = NetworkFee::new(600_000, Amount::create_i64(1, gwei()));
        let c = NetworkFee::new(60_000, Amount::create_i64(1, gwei()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
