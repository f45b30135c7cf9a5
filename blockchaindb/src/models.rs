//! Wire models returned by the query service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::de;

/// Pseudo-address that marks the fee leg of a transaction.
pub const FEE_ADDRESS: &str = "__fee__";

/// A value tagged with the currency it is denominated in, as a base-unit
/// integer string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountModel {
    pub currency_id: String,
    pub amount: String,
}

/// One fee tier advertised for a blockchain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainFee {
    pub fee: AmountModel,
    pub tier: String,
    #[serde(rename = "estimated_confirmation_in", deserialize_with = "de::u64_lenient")]
    pub confirmation_time_ms: u64,
}

impl BlockchainFee {
    pub fn new(amount: impl Into<String>, tier: impl Into<String>, confirmation_time_ms: u64) -> Self {
        Self {
            fee: AmountModel {
                currency_id: String::new(),
                amount: amount.into(),
            },
            tier: tier.into(),
            confirmation_time_ms,
        }
    }

    /// The fee price, in base units of the blockchain's native currency.
    pub fn amount(&self) -> &str {
        &self.fee.amount
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blockchain {
    pub id: String,
    pub name: String,
    pub network: String,
    pub is_mainnet: bool,
    /// Code of the native currency, e.g. `btc`.
    #[serde(rename = "native_currency_id")]
    pub currency_id: String,
    #[serde(default, deserialize_with = "de::opt_u64_lenient")]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub fee_estimates: Vec<BlockchainFee>,
    #[serde(default = "default_confirmations")]
    pub confirmations_until_final: u32,
}

fn default_confirmations() -> u32 {
    6
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDenomination {
    pub name: String,
    #[serde(rename = "short_name")]
    pub code: String,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
}

impl CurrencyDenomination {
    pub fn new(name: &str, code: &str, decimals: u8, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            decimals,
            symbol: symbol.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyModel {
    #[serde(rename = "currency_id")]
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub blockchain_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub denominations: Vec<CurrencyDenomination>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferModel {
    #[serde(rename = "transfer_id")]
    pub id: String,
    pub blockchain_id: String,
    #[serde(deserialize_with = "de::u64_lenient")]
    pub index: u64,
    pub amount: AmountModel,
    #[serde(rename = "from_address", default)]
    pub from: Option<String>,
    #[serde(rename = "to_address", default)]
    pub to: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u64_lenient")]
    pub acknowledgements: Option<u64>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl TransferModel {
    pub fn is_fee(&self) -> bool {
        self.to.as_deref() == Some(FEE_ADDRESS)
    }

    /// Whether `address` is the source or target of this transfer.
    pub fn touches(&self, address: &str) -> bool {
        self.from.as_deref() == Some(address) || self.to.as_deref() == Some(address)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "transaction_id")]
    pub id: String,
    pub blockchain_id: String,
    pub hash: String,
    pub identifier: String,
    /// `confirmed`, `submitted`, `failed` and a few transient values.
    pub status: String,
    #[serde(default, deserialize_with = "de::opt_u64_lenient")]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u64_lenient")]
    pub index: Option<u64>,
    #[serde(default, deserialize_with = "de::opt_u64_lenient")]
    pub confirmations: Option<u64>,
    #[serde(deserialize_with = "de::u64_lenient")]
    pub size: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "de::opt_base64",
        serialize_with = "de::ser_opt_base64"
    )]
    pub raw: Option<Vec<u8>>,
    #[serde(default)]
    pub fee: Option<AmountModel>,
    #[serde(default)]
    pub transfers: Vec<TransferModel>,
}

/// An ERC-20 token listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthToken {
    pub address: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub decimals: u32,
    #[serde(default)]
    pub default_gas_limit: Option<String>,
    #[serde(default)]
    pub default_gas_price: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthGasEstimate {
    pub gas: String,
}

/// HAL list envelope: `{"_embedded": {"<name>": [...]}, "_links": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Embedded {
    #[serde(rename = "_embedded", default)]
    pub embedded: HashMap<String, serde_json::Value>,
    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Links {
    #[serde(default)]
    pub next: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    pub href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blockchain_accepts_string_or_number_height() {
        let json = r#"{
            "id": "bitcoin-mainnet", "name": "Bitcoin", "network": "mainnet",
            "is_mainnet": true, "native_currency_id": "btc",
            "block_height": "654321",
            "fee_estimates": [
                {"fee": {"currency_id": "bitcoin-mainnet:__native__", "amount": "30"},
                 "tier": "10m", "estimated_confirmation_in": 600000}
            ],
            "confirmations_until_final": 6
        }"#;
        let chain: Blockchain = serde_json::from_str(json).unwrap();
        assert_eq!(chain.block_height, Some(654_321));
        assert_eq!(chain.fee_estimates[0].amount(), "30");
        assert_eq!(chain.fee_estimates[0].confirmation_time_ms, 600_000);

        let numeric = json.replace("\"654321\"", "654321");
        let chain: Blockchain = serde_json::from_str(&numeric).unwrap();
        assert_eq!(chain.block_height, Some(654_321));
    }

    #[test]
    fn blockchain_without_height_decodes_as_none() {
        let json = r#"{
            "id": "bitcoin-mainnet", "name": "Bitcoin", "network": "mainnet",
            "is_mainnet": true, "native_currency_id": "btc", "fee_estimates": []
        }"#;
        let chain: Blockchain = serde_json::from_str(json).unwrap();
        assert_eq!(chain.block_height, None);
        assert_eq!(chain.confirmations_until_final, 6);
    }

    #[test]
    fn transaction_decodes_raw_and_transfers() {
        let json = r#"{
            "transaction_id": "bitcoin-mainnet:abc", "blockchain_id": "bitcoin-mainnet",
            "hash": "abc", "identifier": "abc", "status": "confirmed",
            "block_height": 100, "index": "2", "size": "250",
            "timestamp": "2020-01-01T00:00:00Z",
            "raw": "AQID",
            "transfers": [{
                "transfer_id": "t1", "blockchain_id": "bitcoin-mainnet", "index": 0,
                "amount": {"currency_id": "bitcoin-mainnet:__native__", "amount": "1000"},
                "from_address": "a", "to_address": "__fee__", "transaction_id": "bitcoin-mainnet:abc"
            }]
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.raw.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(tx.index, Some(2));
        assert_eq!(tx.size, 250);
        assert!(tx.transfers[0].is_fee());
        assert!(tx.transfers[0].touches("a"));
        assert!(tx.timestamp.is_some());
    }

    #[test]
    fn currency_defaults_unverified() {
        let json = r#"{
            "currency_id": "bitcoin-mainnet:__native__", "name": "Bitcoin", "code": "btc",
            "type": "native", "blockchain_id": "bitcoin-mainnet",
            "denominations": [{"name": "satoshi", "short_name": "sat", "decimals": 0}]
        }"#;
        let currency: CurrencyModel = serde_json::from_str(json).unwrap();
        assert!(!currency.verified);
        assert_eq!(currency.denominations[0].code, "sat");
    }
}
