//! Denominations of a currency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::Currency;

/// A denomination of a [`Currency`].
///
/// Every unit is anchored to a base unit (decimals 0). A base unit is its own
/// base. Units are compatible iff they share a base unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    currency: Currency,
    uids: String,
    name: String,
    symbol: String,
    decimals: u8,
    base_uids: String,
}

impl Unit {
    /// Create a base unit for `currency`.
    pub fn base(
        currency: Currency,
        uids: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        let uids = uids.into();
        Self {
            currency,
            base_uids: uids.clone(),
            uids,
            name: name.into(),
            symbol: symbol.into(),
            decimals: 0,
        }
    }

    /// Create a unit anchored to `base` with the given decimal offset.
    pub fn derived(
        base: &Unit,
        uids: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            currency: base.currency.clone(),
            uids: uids.into(),
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            base_uids: base.base_uids.clone(),
        }
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// The uids of the base unit this unit is anchored to.
    pub fn base_uids(&self) -> &str {
        &self.base_uids
    }

    pub fn is_base(&self) -> bool {
        self.uids == self.base_uids
    }

    pub fn has_currency(&self, currency: &Currency) -> bool {
        &self.currency == currency
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.currency == other.currency && self.base_uids == other.base_uids
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.uids == other.uids && self.base_uids == other.base_uids
    }
}

impl Eq for Unit {}

impl Hash for Unit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uids.hash(state);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Currency {
        Currency::new("bitcoin-mainnet:__native__", "Bitcoin", "btc", "native", None)
    }

    #[test]
    fn derived_unit_shares_base_and_currency() {
        let sat = Unit::base(btc(), "bitcoin-mainnet:__native__:sat", "Satoshi", "SAT");
        let coin = Unit::derived(&sat, "bitcoin-mainnet:__native__:btc", "Bitcoin", "₿", 8);

        assert!(sat.is_base());
        assert!(!coin.is_base());
        assert_eq!(coin.base_uids(), sat.uids());
        assert!(coin.is_compatible(&sat));
        assert!(coin.has_currency(&btc()));
    }

    #[test]
    fn units_of_different_currencies_are_incompatible() {
        let sat = Unit::base(btc(), "btc:sat", "Satoshi", "SAT");
        let eth = Currency::new("ethereum-mainnet:__native__", "Ethereum", "eth", "native", None);
        let wei = Unit::base(eth, "eth:wei", "Wei", "WEI");
        assert!(!sat.is_compatible(&wei));
    }
}
