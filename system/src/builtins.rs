//! Built-in blockchain and currency definitions.
//!
//! Discovery starts from these and lets the query service refine them. They
//! carry a block height and a fee schedule so that a network can still be
//! published when the service is unreachable.

use walletkit_blockchaindb::{Blockchain, BlockchainFee, CurrencyDenomination, CurrencyModel};
use walletkit_types::currency::{CURRENCY_TYPE_ERC20, CURRENCY_TYPE_NATIVE};
use walletkit_types::{AddressScheme, SyncMode};

const ADDRESS_BRD_MAINNET: &str = "0x7108ca7c4718efa810457f228305c9c71390931a";
const ADDRESS_BRD_TESTNET: &str = "0x558ec3152e2eb2174905cd19aea4e34a23de9ad6";
const ADDRESS_EOS_MAINNET: &str = "0x86fa049857e0209aa7d9e616f7eb3b3b78ecfdb0";

const TEN_MINUTES_MS: u64 = 10 * 60 * 1000;
const ONE_MINUTE_MS: u64 = 60 * 1000;

fn blockchain(
    id: &str,
    name: &str,
    network: &str,
    is_mainnet: bool,
    currency_id: &str,
    block_height: u64,
    fee_estimates: Vec<BlockchainFee>,
) -> Blockchain {
    Blockchain {
        id: id.to_string(),
        name: name.to_string(),
        network: network.to_string(),
        is_mainnet,
        currency_id: currency_id.to_string(),
        block_height: Some(block_height),
        fee_estimates,
        confirmations_until_final: 6,
    }
}

fn btc_fees() -> Vec<BlockchainFee> {
    vec![BlockchainFee::new("30", "10m", TEN_MINUTES_MS)]
}

fn bch_fees() -> Vec<BlockchainFee> {
    vec![BlockchainFee::new("10", "10m", TEN_MINUTES_MS)]
}

fn eth_fees() -> Vec<BlockchainFee> {
    vec![BlockchainFee::new("2000000000", "1m", ONE_MINUTE_MS)]
}

fn xrp_fees() -> Vec<BlockchainFee> {
    vec![BlockchainFee::new("10", "1m", ONE_MINUTE_MS)]
}

/// Every blockchain the system knows how to drive, mainnet and testnet.
pub fn default_blockchains() -> Vec<Blockchain> {
    vec![
        blockchain("bitcoin-mainnet", "Bitcoin", "mainnet", true, "btc", 654_321, btc_fees()),
        blockchain(
            "bitcoin-cash-mainnet",
            "Bitcoin Cash",
            "mainnet",
            true,
            "bch",
            1_000_000,
            bch_fees(),
        ),
        blockchain("ethereum-mainnet", "Ethereum", "mainnet", true, "eth", 8_000_000, eth_fees()),
        blockchain("ripple-mainnet", "Ripple", "mainnet", true, "xrp", 5_000_000, xrp_fees()),
        blockchain("bitcoin-testnet", "Bitcoin Test", "testnet", false, "btc", 900_000, btc_fees()),
        blockchain(
            "bitcoin-cash-testnet",
            "Bitcoin Cash Test",
            "testnet",
            false,
            "bch",
            1_200_000,
            bch_fees(),
        ),
        blockchain(
            "ethereum-testnet",
            "Ethereum Testnet",
            "testnet",
            false,
            "eth",
            1_000_000,
            eth_fees(),
        ),
        blockchain(
            "ethereum-rinkeby",
            "Ethereum Rinkeby",
            "rinkeby",
            false,
            "eth",
            2_000_000,
            eth_fees(),
        ),
    ]
}

// ── Currencies ──────────────────────────────────────────────────────────

fn btc_denominations() -> Vec<CurrencyDenomination> {
    vec![
        CurrencyDenomination::new("Satoshi", "sat", 0, "sat"),
        CurrencyDenomination::new("Bitcoin", "btc", 8, "₿"),
    ]
}

fn bch_denominations() -> Vec<CurrencyDenomination> {
    vec![
        CurrencyDenomination::new("Satoshi", "sat", 0, "sat"),
        CurrencyDenomination::new("Bitcoin Cash", "bch", 8, "bch"),
    ]
}

fn eth_denominations() -> Vec<CurrencyDenomination> {
    vec![
        CurrencyDenomination::new("Wei", "wei", 0, "wei"),
        CurrencyDenomination::new("Gwei", "gwei", 9, "gwei"),
        CurrencyDenomination::new("Ether", "eth", 18, "Ξ"),
    ]
}

fn token_denominations(code: &str) -> Vec<CurrencyDenomination> {
    let int_name = format!("{code} Token INT");
    let int_code = format!("{code}I").to_lowercase();
    let name = format!("{code} Token");
    let lower = code.to_lowercase();
    vec![
        CurrencyDenomination::new(&int_name, &int_code, 0, &int_code),
        CurrencyDenomination::new(&name, &lower, 18, &lower),
    ]
}

fn currency(
    blockchain_id: &str,
    id_suffix: &str,
    name: &str,
    code: &str,
    kind: &str,
    address: Option<&str>,
    denominations: Vec<CurrencyDenomination>,
) -> CurrencyModel {
    CurrencyModel {
        id: format!("{blockchain_id}:{id_suffix}"),
        name: name.to_string(),
        code: code.to_string(),
        kind: kind.to_string(),
        blockchain_id: blockchain_id.to_string(),
        address: address.map(str::to_string),
        verified: true,
        denominations,
    }
}

fn native(
    blockchain_id: &str,
    name: &str,
    code: &str,
    denominations: Vec<CurrencyDenomination>,
) -> CurrencyModel {
    currency(
        blockchain_id,
        "__native__",
        name,
        code,
        CURRENCY_TYPE_NATIVE,
        None,
        denominations,
    )
}

fn token(blockchain_id: &str, code: &str, address: &str) -> CurrencyModel {
    currency(
        blockchain_id,
        address,
        &format!("{code} Token"),
        code,
        CURRENCY_TYPE_ERC20,
        Some(address),
        token_denominations(code),
    )
}

/// Currencies assumed to exist on the built-in blockchains.
pub fn default_currencies() -> Vec<CurrencyModel> {
    vec![
        native("bitcoin-mainnet", "Bitcoin", "btc", btc_denominations()),
        native("bitcoin-cash-mainnet", "Bitcoin Cash", "bch", bch_denominations()),
        native("ethereum-mainnet", "Ethereum", "eth", eth_denominations()),
        token("ethereum-mainnet", "BRD", ADDRESS_BRD_MAINNET),
        token("ethereum-mainnet", "EOS", ADDRESS_EOS_MAINNET),
        native("bitcoin-testnet", "Bitcoin", "btc", btc_denominations()),
        native("bitcoin-cash-testnet", "Bitcoin Cash", "bch", bch_denominations()),
        native("ethereum-testnet", "Ethereum", "eth", eth_denominations()),
        token("ethereum-testnet", "BRD", ADDRESS_BRD_TESTNET),
    ]
}

// ── Modes and schemes ───────────────────────────────────────────────────

/// Supported sync modes and the default one, keyed by native currency code.
pub fn modes_for(currency_code: &str) -> (Vec<SyncMode>, SyncMode) {
    match currency_code.to_lowercase().as_str() {
        "btc" => (vec![SyncMode::ApiOnly, SyncMode::P2pOnly], SyncMode::P2pOnly),
        "bch" => (vec![SyncMode::P2pOnly], SyncMode::P2pOnly),
        "eth" => (
            vec![SyncMode::ApiOnly, SyncMode::ApiWithP2pSubmit],
            SyncMode::ApiOnly,
        ),
        _ => (vec![SyncMode::ApiOnly], SyncMode::ApiOnly),
    }
}

/// Supported address schemes and the default one, keyed by native currency code.
pub fn schemes_for(currency_code: &str) -> (Vec<AddressScheme>, AddressScheme) {
    match currency_code.to_lowercase().as_str() {
        "btc" => (
            vec![AddressScheme::BtcLegacy, AddressScheme::BtcSegwit],
            AddressScheme::BtcSegwit,
        ),
        "bch" => (vec![AddressScheme::BtcLegacy], AddressScheme::BtcLegacy),
        "eth" => (vec![AddressScheme::EthDefault], AddressScheme::EthDefault),
        _ => (vec![AddressScheme::GenDefault], AddressScheme::GenDefault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_has_height_and_fees() {
        for b in default_blockchains() {
            assert!(b.block_height.is_some(), "{}", b.id);
            assert!(!b.fee_estimates.is_empty(), "{}", b.id);
        }
    }

    #[test]
    fn builtin_currencies_are_verified_and_have_a_base() {
        for c in default_currencies() {
            assert!(c.verified);
            assert!(c.denominations.iter().any(|d| d.decimals == 0), "{}", c.id);
        }
    }

    #[test]
    fn mode_table() {
        let (modes, default) = modes_for("BTC");
        assert!(modes.contains(&SyncMode::ApiOnly));
        assert_eq!(default, SyncMode::P2pOnly);
        assert_eq!(modes_for("xrp"), (vec![SyncMode::ApiOnly], SyncMode::ApiOnly));
        assert_eq!(schemes_for("eth").1, AddressScheme::EthDefault);
    }
}
