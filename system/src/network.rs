//! Blockchain networks.
//!
//! A [`Network`] is built once during discovery and is afterwards immutable
//! apart from its block height and fee schedule.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use walletkit_types::{AddressScheme, Currency, NetworkFee, SyncMode, Unit};

use crate::SystemError;

/// Units bound to one currency of a network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkAssociation {
    base_unit: Unit,
    default_unit: Unit,
    units: Vec<Unit>,
}

impl NetworkAssociation {
    /// `base_unit` and `default_unit` are added to `units` when missing.
    pub fn new(base_unit: Unit, default_unit: Unit, mut units: Vec<Unit>) -> Self {
        if !units.contains(&base_unit) {
            units.insert(0, base_unit.clone());
        }
        if !units.contains(&default_unit) {
            units.push(default_unit.clone());
        }
        Self {
            base_unit,
            default_unit,
            units,
        }
    }

    pub fn base_unit(&self) -> &Unit {
        &self.base_unit
    }

    pub fn default_unit(&self) -> &Unit {
        &self.default_unit
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }
}

/// Construction parameters for a [`Network`].
#[derive(Clone, Debug)]
pub struct NetworkSpec {
    pub uids: String,
    pub name: String,
    pub is_mainnet: bool,
    pub currency: Currency,
    pub height: u64,
    pub confirmations_until_final: u32,
    pub associations: Vec<(Currency, NetworkAssociation)>,
    pub fees: Vec<NetworkFee>,
    pub supported_modes: Vec<SyncMode>,
    pub default_mode: SyncMode,
    pub supported_schemes: Vec<AddressScheme>,
    pub default_scheme: AddressScheme,
}

pub struct Network {
    uids: String,
    name: String,
    is_mainnet: bool,
    currency: Currency,
    confirmations_until_final: u32,
    supported_modes: Vec<SyncMode>,
    default_mode: SyncMode,
    supported_schemes: Vec<AddressScheme>,
    default_scheme: AddressScheme,
    height: AtomicU64,
    fees: RwLock<Vec<NetworkFee>>,
    associations: RwLock<Vec<(Currency, NetworkAssociation)>>,
}

impl Network {
    /// Build a network. Fails if the fee list is empty or the native
    /// currency has no unit association.
    pub fn new(spec: NetworkSpec) -> Result<Self, SystemError> {
        if spec.fees.is_empty() {
            return Err(SystemError::EmptyFees);
        }
        if !spec.associations.iter().any(|(c, _)| c == &spec.currency) {
            return Err(SystemError::InvalidNetwork(format!(
                "{}: native currency {} has no units",
                spec.uids,
                spec.currency.uids()
            )));
        }
        let default_mode = if spec.supported_modes.contains(&spec.default_mode) {
            spec.default_mode
        } else {
            spec.supported_modes.first().copied().unwrap_or(SyncMode::ApiOnly)
        };
        let mut supported_modes = spec.supported_modes;
        if supported_modes.is_empty() {
            supported_modes.push(default_mode);
        }
        let mut supported_schemes = spec.supported_schemes;
        if !supported_schemes.contains(&spec.default_scheme) {
            supported_schemes.push(spec.default_scheme);
        }

        Ok(Self {
            uids: spec.uids,
            name: spec.name,
            is_mainnet: spec.is_mainnet,
            currency: spec.currency,
            confirmations_until_final: spec.confirmations_until_final,
            supported_modes,
            default_mode,
            supported_schemes,
            default_scheme: spec.default_scheme,
            height: AtomicU64::new(spec.height),
            fees: RwLock::new(spec.fees),
            associations: RwLock::new(spec.associations),
        })
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    /// The native currency.
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn confirmations_until_final(&self) -> u32 {
        self.confirmations_until_final
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::Release);
    }

    // ── Fees ────────────────────────────────────────────────────────────

    pub fn fees(&self) -> Vec<NetworkFee> {
        self.fees.read().clone()
    }

    /// Replace the fee schedule. An empty list is rejected.
    pub fn set_fees(&self, fees: Vec<NetworkFee>) -> Result<(), SystemError> {
        if fees.is_empty() {
            return Err(SystemError::EmptyFees);
        }
        *self.fees.write() = fees;
        Ok(())
    }

    /// The cheapest fee: the one with the longest confirmation time.
    pub fn minimum_fee(&self) -> Option<NetworkFee> {
        self.fees
            .read()
            .iter()
            .max_by_key(|f| f.confirmation_time_ms())
            .cloned()
    }

    // ── Currencies and units ────────────────────────────────────────────

    pub fn currencies(&self) -> Vec<Currency> {
        self.associations.read().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn has_currency(&self, currency: &Currency) -> bool {
        self.associations.read().iter().any(|(c, _)| c == currency)
    }

    pub fn currency_by_code(&self, code: &str) -> Option<Currency> {
        self.associations
            .read()
            .iter()
            .find(|(c, _)| c.matches_code(code))
            .map(|(c, _)| c.clone())
    }

    pub fn currency_by_uids(&self, uids: &str) -> Option<Currency> {
        self.associations
            .read()
            .iter()
            .find(|(c, _)| c.uids() == uids)
            .map(|(c, _)| c.clone())
    }

    fn with_association<T>(
        &self,
        currency: &Currency,
        f: impl FnOnce(&NetworkAssociation) -> T,
    ) -> Option<T> {
        self.associations
            .read()
            .iter()
            .find(|(c, _)| c == currency)
            .map(|(_, a)| f(a))
    }

    pub fn base_unit_for(&self, currency: &Currency) -> Option<Unit> {
        self.with_association(currency, |a| a.base_unit.clone())
    }

    pub fn default_unit_for(&self, currency: &Currency) -> Option<Unit> {
        self.with_association(currency, |a| a.default_unit.clone())
    }

    pub fn units_for(&self, currency: &Currency) -> Option<Vec<Unit>> {
        self.with_association(currency, |a| a.units.clone())
    }

    pub fn has_unit_for(&self, currency: &Currency, unit: &Unit) -> Option<bool> {
        self.with_association(currency, |a| a.units.contains(unit))
    }

    /// Register a currency. Ignored if the currency is already present.
    pub fn add_currency(&self, currency: Currency, base_unit: Unit, default_unit: Unit) {
        let mut associations = self.associations.write();
        if associations.iter().any(|(c, _)| c == &currency) {
            return;
        }
        let association = NetworkAssociation::new(base_unit, default_unit, Vec::new());
        associations.push((currency, association));
    }

    /// Add a unit to a registered currency. Ignored for unknown currencies
    /// or units already present.
    pub fn add_unit_for(&self, currency: &Currency, unit: Unit) {
        let mut associations = self.associations.write();
        if let Some((_, a)) = associations.iter_mut().find(|(c, _)| c == currency) {
            if !a.units.contains(&unit) {
                a.units.push(unit);
            }
        }
    }

    // ── Modes and schemes ───────────────────────────────────────────────

    pub fn supported_modes(&self) -> &[SyncMode] {
        &self.supported_modes
    }

    pub fn default_mode(&self) -> SyncMode {
        self.default_mode
    }

    pub fn supports_mode(&self, mode: SyncMode) -> bool {
        self.supported_modes.contains(&mode)
    }

    pub fn supported_address_schemes(&self) -> &[AddressScheme] {
        &self.supported_schemes
    }

    pub fn default_address_scheme(&self) -> AddressScheme {
        self.default_scheme
    }

    pub fn supports_address_scheme(&self, scheme: AddressScheme) -> bool {
        self.supported_schemes.contains(&scheme)
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.uids == other.uids
    }
}

impl Eq for Network {}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("uids", &self.uids)
            .field("is_mainnet", &self.is_mainnet)
            .field("height", &self.height())
            .finish()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use walletkit_types::Amount;

    pub(crate) fn btc_currency() -> Currency {
        Currency::new("bitcoin-mainnet:__native__", "Bitcoin", "btc", "native", None)
    }

    pub(crate) fn btc_network() -> Network {
        let btc = btc_currency();
        let sat = Unit::base(btc.clone(), "bitcoin-mainnet:__native__:sat", "Satoshi", "SAT");
        let coin = Unit::derived(&sat, "bitcoin-mainnet:__native__:btc", "Bitcoin", "BTC", 8);
        let association = NetworkAssociation::new(sat.clone(), coin.clone(), vec![coin]);
        Network::new(NetworkSpec {
            uids: "bitcoin-mainnet".into(),
            name: "Bitcoin".into(),
            is_mainnet: true,
            currency: btc.clone(),
            height: 654_321,
            confirmations_until_final: 6,
            associations: vec![(btc, association)],
            fees: vec![
                NetworkFee::new(600_000, Amount::create_i64(30, sat.clone())),
                NetworkFee::new(3_600_000, Amount::create_i64(10, sat)),
            ],
            supported_modes: vec![SyncMode::ApiOnly, SyncMode::P2pOnly],
            default_mode: SyncMode::ApiOnly,
            supported_schemes: vec![AddressScheme::BtcLegacy, AddressScheme::BtcSegwit],
            default_scheme: AddressScheme::BtcSegwit,
        })
        .unwrap()
    }

    #[test]
    fn association_always_contains_base_and_default() {
        let btc = btc_currency();
        let sat = Unit::base(btc, "sat", "Satoshi", "SAT");
        let coin = Unit::derived(&sat, "btc", "Bitcoin", "BTC", 8);
        let association = NetworkAssociation::new(sat.clone(), coin.clone(), Vec::new());
        assert!(association.units().contains(&sat));
        assert!(association.units().contains(&coin));
    }

    #[test]
    fn units_resolve_through_currency() {
        let network = btc_network();
        let btc = btc_currency();
        assert!(network.has_currency(&btc));
        assert_eq!(network.base_unit_for(&btc).unwrap().decimals(), 0);
        assert_eq!(network.default_unit_for(&btc).unwrap().decimals(), 8);
        assert_eq!(network.units_for(&btc).unwrap().len(), 2);
        assert_eq!(network.currency_by_code("BTC"), Some(btc));
    }

    #[test]
    fn minimum_fee_has_longest_confirmation_time() {
        let network = btc_network();
        assert_eq!(network.minimum_fee().unwrap().confirmation_time_ms(), 3_600_000);
    }

    #[test]
    fn empty_fee_list_is_rejected() {
        let network = btc_network();
        assert!(matches!(network.set_fees(Vec::new()), Err(SystemError::EmptyFees)));
        assert_eq!(network.fees().len(), 2);
    }

    #[test]
    fn network_without_native_units_is_rejected() {
        let sat = Unit::base(btc_currency(), "sat", "Satoshi", "SAT");
        let result = Network::new(NetworkSpec {
            uids: "bitcoin-mainnet".into(),
            name: "Bitcoin".into(),
            is_mainnet: true,
            currency: btc_currency(),
            height: 1,
            confirmations_until_final: 6,
            associations: Vec::new(),
            fees: vec![NetworkFee::new(1, Amount::create_i64(1, sat))],
            supported_modes: vec![SyncMode::ApiOnly],
            default_mode: SyncMode::ApiOnly,
            supported_schemes: vec![AddressScheme::BtcLegacy],
            default_scheme: AddressScheme::BtcLegacy,
        });
        assert!(result.is_err());
    }

    #[test]
    fn modes_and_schemes() {
        let network = btc_network();
        assert!(network.supports_mode(SyncMode::ApiOnly));
        assert!(!network.supports_mode(SyncMode::P2pWithApiSync));
        assert!(network.supports_address_scheme(AddressScheme::BtcLegacy));
        assert!(!network.supports_address_scheme(AddressScheme::EthDefault));
        assert_eq!(network.default_address_scheme(), AddressScheme::BtcSegwit);
    }

    #[test]
    fn height_is_mutable() {
        let network = btc_network();
        network.set_height(700_000);
        assert_eq!(network.height(), 700_000);
    }

    #[test]
    fn currencies_and_units_can_be_added() {
        let network = btc_network();
        let usdt = Currency::new("bitcoin-mainnet:usdt", "Tether", "usdt", "erc20", None);
        let base = Unit::base(usdt.clone(), "usdt:base", "Tether Base", "USDTb");
        let display = Unit::derived(&base, "usdt:usdt", "Tether", "USDT", 6);
        assert_eq!(network.has_unit_for(&usdt, &base), None);

        network.add_currency(usdt.clone(), base.clone(), base.clone());
        network.add_unit_for(&usdt, display.clone());
        network.add_unit_for(&usdt, display.clone());

        assert_eq!(network.has_unit_for(&usdt, &display), Some(true));
        assert_eq!(network.units_for(&usdt).unwrap().len(), 2);
        assert_eq!(network.currencies().len(), 2);
        assert_eq!(network.supported_address_schemes().len(), 2);
    }
}
