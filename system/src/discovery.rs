//! Network discovery.
//!
//! Builds the session's [`Network`]s by merging the built-in blockchain and
//! currency definitions with what the query service reports. Every network
//! is announced as soon as it is complete; the completion callback runs once
//! after every outstanding request has returned.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use walletkit_blockchaindb::{
    Blockchain, BlockchainDb, BlockchainFee, CurrencyModel, QueryError,
};
use walletkit_types::currency::CURRENCY_TYPE_NATIVE;
use walletkit_types::{Amount, Currency, NetworkFee, Unit};

use crate::builtins;
use crate::network::{Network, NetworkAssociation, NetworkSpec};
use crate::tracing_spans::blockchain_span;

type Completion = Box<dyn FnOnce(Vec<Arc<Network>>) + Send + 'static>;

// ── Latch ───────────────────────────────────────────────────────────────

/// Counts outstanding requests and fires its completion when the count
/// returns to zero.
struct CountUpDownLatch {
    count: AtomicUsize,
    networks: Mutex<Vec<Arc<Network>>>,
    on_complete: Mutex<Option<Completion>>,
}

impl CountUpDownLatch {
    fn new(on_complete: Completion) -> Self {
        Self {
            count: AtomicUsize::new(0),
            networks: Mutex::new(Vec::new()),
            on_complete: Mutex::new(Some(on_complete)),
        }
    }

    fn count_up(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn count_down(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            let completion = self.on_complete.lock().take();
            if let Some(completion) = completion {
                let networks = std::mem::take(&mut *self.networks.lock());
                completion(networks);
            }
        }
    }

    fn push(&self, network: Arc<Network>) {
        self.networks.lock().push(network);
    }
}

// ── Discovery ───────────────────────────────────────────────────────────

pub struct NetworkDiscovery {
    query: Arc<dyn BlockchainDb>,
    is_mainnet: bool,
    app_currencies: Vec<CurrencyModel>,
}

impl NetworkDiscovery {
    pub fn new(
        query: Arc<dyn BlockchainDb>,
        is_mainnet: bool,
        app_currencies: Vec<CurrencyModel>,
    ) -> Self {
        Self {
            query,
            is_mainnet,
            app_currencies,
        }
    }

    /// Run one discovery pass. `on_network` sees each network as it is
    /// built; `on_complete` sees all of them, once.
    pub fn run<N, C>(self, on_network: N, on_complete: C)
    where
        N: Fn(Arc<Network>) + Send + Sync + 'static,
        C: FnOnce(Vec<Arc<Network>>) + Send + 'static,
    {
        let latch = Arc::new(CountUpDownLatch::new(Box::new(on_complete)));
        let on_network: Arc<dyn Fn(Arc<Network>) + Send + Sync> = Arc::new(on_network);
        let is_mainnet = self.is_mainnet;
        let query = self.query;
        let app_currencies = Arc::new(self.app_currencies);

        latch.count_up();
        let outer = Arc::clone(&latch);
        let currencies_query = Arc::clone(&query);
        query.get_blockchains(
            is_mainnet,
            Box::new(move |result| {
                let remote = match result {
                    Ok(remote) => remote,
                    Err(e) => {
                        warn!(error = %e, "blockchain query failed; using built-in definitions");
                        Vec::new()
                    }
                };
                let supported: Vec<Blockchain> = builtins::default_blockchains()
                    .into_iter()
                    .filter(|b| b.is_mainnet == is_mainnet && b.block_height.is_some())
                    .collect();

                for blockchain in merge_blockchains(supported, &remote) {
                    outer.count_up();
                    let latch = Arc::clone(&outer);
                    let on_network = Arc::clone(&on_network);
                    let app_currencies = Arc::clone(&app_currencies);
                    let id = blockchain.id.clone();
                    currencies_query.get_currencies(
                        &id,
                        Box::new(move |result| {
                            let _span = blockchain_span(&blockchain.id).entered();
                            let currencies = merge_currencies(
                                &blockchain.id,
                                &builtins::default_currencies(),
                                &app_currencies,
                                result,
                            );
                            if let Some(network) = build_network(&blockchain, &currencies) {
                                let network = Arc::new(network);
                                latch.push(Arc::clone(&network));
                                on_network(network);
                            }
                            latch.count_down();
                        }),
                    );
                }
                outer.count_down();
            }),
        );
    }
}

// ── Merging ─────────────────────────────────────────────────────────────

/// Merge built-in blockchains with remote ones. Only built-in ids survive;
/// a remote height replaces the built-in one, and non-empty remote fee
/// estimates replace the built-in ones.
pub fn merge_blockchains(supported: Vec<Blockchain>, remote: &[Blockchain]) -> Vec<Blockchain> {
    supported
        .into_iter()
        .map(|mut builtin| {
            if let Some(r) = remote.iter().find(|r| r.id == builtin.id) {
                if r.block_height.is_some() {
                    builtin.block_height = r.block_height;
                }
                if !r.fee_estimates.is_empty() {
                    builtin.fee_estimates = r.fee_estimates.clone();
                }
                builtin.confirmations_until_final = r.confirmations_until_final;
            }
            builtin
        })
        .collect()
}

fn upsert(merged: &mut Vec<CurrencyModel>, blockchain_id: &str, currencies: &[CurrencyModel]) {
    for c in currencies {
        if c.blockchain_id != blockchain_id || !c.verified {
            continue;
        }
        match merged.iter_mut().find(|m| m.id == c.id) {
            Some(slot) => *slot = c.clone(),
            None => merged.push(c.clone()),
        }
    }
}

/// Merge currency lists for one blockchain, keyed by id with the last
/// writer winning. With a remote reply the order is defaults, app, remote;
/// without one it is defaults, app. Unverified and foreign currencies are
/// dropped.
pub fn merge_currencies(
    blockchain_id: &str,
    defaults: &[CurrencyModel],
    app: &[CurrencyModel],
    remote: Result<Vec<CurrencyModel>, QueryError>,
) -> Vec<CurrencyModel> {
    let mut merged = Vec::new();
    upsert(&mut merged, blockchain_id, defaults);
    upsert(&mut merged, blockchain_id, app);
    match remote {
        Ok(remote) => upsert(&mut merged, blockchain_id, &remote),
        Err(e) => debug!(blockchain = blockchain_id, error = %e, "currency query failed"),
    }
    merged
}

// ── Units ───────────────────────────────────────────────────────────────

/// Build the currency and its units. The base is the first zero-decimal
/// denomination, or a synthesized `<CODE>_INTEGER` unit; the default is the
/// unit with the most decimals, first one wins on a tie.
pub fn build_association(model: &CurrencyModel) -> (Currency, NetworkAssociation) {
    let currency = Currency::new(
        model.id.clone(),
        model.name.clone(),
        model.code.clone(),
        model.kind.clone(),
        model.address.clone(),
    );

    let base = match model.denominations.iter().find(|d| d.decimals == 0) {
        Some(d) => Unit::base(
            currency.clone(),
            format!("{}:{}", currency.uids(), d.code),
            d.name.clone(),
            d.symbol.clone(),
        ),
        None => {
            let code = currency.code().to_uppercase();
            let name = format!("{code}_INTEGER");
            Unit::base(
                currency.clone(),
                format!("{}:{}", currency.uids(), name),
                name,
                format!("{code}I"),
            )
        }
    };

    let mut units = vec![base.clone()];
    units.extend(model.denominations.iter().filter(|d| d.decimals != 0).map(|d| {
        Unit::derived(
            &base,
            format!("{}:{}", currency.uids(), d.code),
            d.name.clone(),
            d.symbol.clone(),
            d.decimals,
        )
    }));

    let default = default_unit(&units).clone();
    (currency, NetworkAssociation::new(base, default, units))
}

fn default_unit(units: &[Unit]) -> &Unit {
    let mut best = &units[0];
    for unit in &units[1..] {
        if unit.decimals() > best.decimals() {
            best = unit;
        }
    }
    best
}

/// Parse fee estimates in `fee_unit`. Unparseable amounts are skipped.
pub fn parse_fees(estimates: &[BlockchainFee], fee_unit: &Unit) -> Vec<NetworkFee> {
    estimates
        .iter()
        .filter_map(|f| {
            Amount::create_string(f.amount(), false, fee_unit.clone())
                .map(|amount| NetworkFee::new(f.confirmation_time_ms, amount))
        })
        .collect()
}

fn is_native_currency(blockchain: &Blockchain, currency: &Currency) -> bool {
    currency.uids().eq_ignore_ascii_case(&blockchain.currency_id)
        || (currency.kind() == CURRENCY_TYPE_NATIVE && currency.matches_code(&blockchain.currency_id))
}

/// Build a complete network or nothing. A blockchain whose native currency
/// or fee schedule cannot be resolved is dropped.
pub fn build_network(blockchain: &Blockchain, currencies: &[CurrencyModel]) -> Option<Network> {
    let height = blockchain.block_height?;
    let associations: Vec<(Currency, NetworkAssociation)> =
        currencies.iter().map(build_association).collect();

    let Some((currency, association)) = associations
        .iter()
        .find(|(c, _)| is_native_currency(blockchain, c))
    else {
        debug!(blockchain = %blockchain.id, currency = %blockchain.currency_id, "missed currency");
        return None;
    };
    let currency = currency.clone();

    let fees = parse_fees(&blockchain.fee_estimates, association.base_unit());
    if fees.is_empty() {
        debug!(blockchain = %blockchain.name, "missed fees");
        return None;
    }

    let (supported_modes, default_mode) = builtins::modes_for(currency.code());
    let (supported_schemes, default_scheme) = builtins::schemes_for(currency.code());

    match Network::new(NetworkSpec {
        uids: blockchain.id.clone(),
        name: blockchain.name.clone(),
        is_mainnet: blockchain.is_mainnet,
        currency,
        height,
        confirmations_until_final: blockchain.confirmations_until_final,
        associations,
        fees,
        supported_modes,
        default_mode,
        supported_schemes,
        default_scheme,
    }) {
        Ok(network) => Some(network),
        Err(e) => {
            warn!(blockchain = %blockchain.id, error = %e, "network dropped");
            None
        }
    }
}
