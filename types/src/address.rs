//! Addresses, address schemes and synchronization modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A chain-specific address in its canonical string form.
///
/// Encoding and validation belong to the sync engine; the core only compares
/// and forwards addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// How addresses are derived and rendered for a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressScheme {
    BtcLegacy,
    BtcSegwit,
    EthDefault,
    GenDefault,
}

impl fmt::Display for AddressScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BtcLegacy => "btc-legacy",
            Self::BtcSegwit => "btc-segwit",
            Self::EthDefault => "eth-default",
            Self::GenDefault => "gen-default",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AddressScheme {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btc-legacy" => Ok(Self::BtcLegacy),
            "btc-segwit" => Ok(Self::BtcSegwit),
            "eth-default" => Ok(Self::EthDefault),
            "gen-default" => Ok(Self::GenDefault),
            other => Err(TypesError::UnknownAddressScheme(other.to_string())),
        }
    }
}

/// How a wallet manager synchronizes with its blockchain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Everything through the remote query service.
    ApiOnly,
    /// Sync through the query service, submit through P2P.
    ApiWithP2pSubmit,
    /// Sync through P2P, fill gaps through the query service.
    P2pWithApiSync,
    P2pOnly,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ApiOnly => "api-only",
            Self::ApiWithP2pSubmit => "api-with-p2p-submit",
            Self::P2pWithApiSync => "p2p-with-api-sync",
            Self::P2pOnly => "p2p-only",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SyncMode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api-only" => Ok(Self::ApiOnly),
            "api-with-p2p-submit" => Ok(Self::ApiWithP2pSubmit),
            "p2p-with-api-sync" => Ok(Self::P2pWithApiSync),
            "p2p-only" => Ok(Self::P2pOnly),
            other => Err(TypesError::UnknownSyncMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_mode_parses_its_display_form() {
        for mode in [
            SyncMode::ApiOnly,
            SyncMode::ApiWithP2pSubmit,
            SyncMode::P2pWithApiSync,
            SyncMode::P2pOnly,
        ] {
            assert_eq!(mode.to_string().parse::<SyncMode>().unwrap(), mode);
        }
        assert!("p2p".parse::<SyncMode>().is_err());
    }

    #[test]
    fn address_scheme_rejects_unknown() {
        assert_eq!("btc-segwit".parse::<AddressScheme>().unwrap(), AddressScheme::BtcSegwit);
        let err = "base58".parse::<AddressScheme>().unwrap_err();
        assert!(matches!(err, TypesError::UnknownAddressScheme(s) if s == "base58"));
    }

    #[test]
    fn serde_names_match_display() {
        for mode in [SyncMode::ApiWithP2pSubmit, SyncMode::P2pWithApiSync] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
        let scheme: AddressScheme = serde_json::from_str("\"eth-default\"").unwrap();
        assert_eq!(scheme, AddressScheme::EthDefault);
    }
}
