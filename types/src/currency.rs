//! Tradeable assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Currency type tag for a blockchain's own coin.
pub const CURRENCY_TYPE_NATIVE: &str = "native";

/// Currency type tag for ERC-20 style tokens.
pub const CURRENCY_TYPE_ERC20: &str = "erc20";

/// A tradeable asset, identified globally by its `uids`.
///
/// Two currencies are equal iff their `uids` are equal; the remaining fields
/// are descriptive only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Currency {
    uids: String,
    name: String,
    code: String,
    kind: String,
    issuer: Option<String>,
}

impl Currency {
    pub fn new(
        uids: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        kind: impl Into<String>,
        issuer: Option<String>,
    ) -> Self {
        Self {
            uids: uids.into(),
            name: name.into(),
            code: code.into(),
            kind: kind.into(),
            issuer,
        }
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// The currency type, e.g. `native` or `erc20`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Issuing contract address, for tokens.
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Case-insensitive comparison against a currency code.
    pub fn matches_code(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.uids == other.uids
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uids.hash(state);
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_uids_only() {
        let a = Currency::new("bitcoin-mainnet:__native__", "Bitcoin", "btc", "native", None);
        let b = Currency::new("bitcoin-mainnet:__native__", "BTC (renamed)", "BTC", "native", None);
        let c = Currency::new("bitcoin-testnet:__native__", "Bitcoin", "btc", "native", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn code_match_ignores_case() {
        let eth = Currency::new("ethereum-mainnet:__native__", "Ethereum", "eth", "native", None);
        assert!(eth.matches_code("ETH"));
        assert!(!eth.matches_code("btc"));
    }
}
