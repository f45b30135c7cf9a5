//! Limit and fee estimation through a live system: the engine's first pass,
//! fee-basis replies arriving as wallet events, and the maximum search.

mod common;

use std::sync::Arc;

use common::{Harness, Seen, TIMEOUT};
use walletkit_nullables::EngineCall;
use walletkit_system::{EngineLimitEstimate, EngineWalletEvent, Wallet, WalletEvent};
use walletkit_types::{
    Address, AddressScheme, Amount, FeeEstimationError, LimitEstimationError, NetworkFee, SyncMode,
    TransferFeeBasis, Unit,
};

struct Funded {
    h: Harness,
    wallet: Arc<Wallet>,
    sat: Unit,
    fee: NetworkFee,
}

/// A bitcoin wallet holding `balance` satoshi.
fn funded(balance: i64) -> Funded {
    let h = Harness::new();
    h.configure();
    let (manager, wallet) =
        h.manager_with_wallet("bitcoin-mainnet", SyncMode::ApiOnly, AddressScheme::BtcLegacy);
    let network = h.network("bitcoin-mainnet");
    let sat = network.base_unit_for(wallet.currency()).unwrap();
    h.engine.emit_wallet_event(
        manager.handle(),
        wallet.handle(),
        EngineWalletEvent::BalanceUpdated(Amount::create_i64(balance, sat.clone())),
    );
    h.wait_for(|seen| matches!(seen, Seen::Wallet(_, WalletEvent::BalanceUpdated(_))));
    let fee = network.minimum_fee().unwrap();
    Funded {
        h,
        wallet,
        sat,
        fee,
    }
}

impl Funded {
    fn sats(&self, v: i64) -> Amount {
        Amount::create_i64(v, self.sat.clone())
    }

    /// A basis whose fee is `fee` satoshi.
    fn basis(&self, fee: i64) -> TransferFeeBasis {
        TransferFeeBasis::new(self.sats(fee / 100), 100.0)
    }

    fn limit(&self, amount: Option<i64>, need_fee_estimate: bool) {
        self.h.engine.set_limit(EngineLimitEstimate {
            amount: amount.map(|v| self.sats(v)),
            need_fee_estimate,
            is_zero_if_insufficient_funds: false,
        });
    }

    fn fee_estimates(&self) -> usize {
        self.h
            .engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::EstimateFeeBasis { .. }))
            .count()
    }
}

fn target() -> Address {
    Address::new("1BoatSLRHtKNngkdXEeobR76b53LETtpyT")
}

fn base_units(amount: &Amount) -> String {
    amount.to_string_with_base(10, "").unwrap()
}

#[tokio::test]
async fn maximum_converges_when_fee_is_constant() {
    let f = funded(1_000_000);
    f.limit(Some(1_000_000), true);
    f.h.engine.set_fallback_fee(f.basis(1_000));

    let max = f
        .wallet
        .estimate_limit_maximum_async(target(), f.fee.clone())
        .await
        .unwrap();
    assert_eq!(base_units(&max), "999000");
    assert_eq!(f.fee_estimates(), 2);
    assert_eq!(f.h.system.metrics().estimations_succeeded.get(), 1);
}

#[tokio::test]
async fn maximum_fails_when_fee_keeps_moving() {
    let f = funded(1_000_000);
    f.limit(Some(1_000_000), true);
    f.h.engine
        .push_fee_replies([Ok(f.basis(1_000)), Ok(f.basis(1_100)), Ok(f.basis(1_200))]);

    let result = f
        .wallet
        .estimate_limit_maximum_async(target(), f.fee.clone())
        .await;
    assert_eq!(result, Err(LimitEstimationError::ServiceFailure));
    assert_eq!(f.fee_estimates(), 3);
    assert_eq!(f.h.system.metrics().estimations_failed.get(), 1);
}

#[tokio::test]
async fn fee_service_error_ends_the_search() {
    let f = funded(1_000_000);
    f.limit(Some(1_000_000), true);
    f.h.engine
        .push_fee_replies([Err(FeeEstimationError::ServiceUnavailable)]);

    let result = f
        .wallet
        .estimate_limit_maximum_async(target(), f.fee.clone())
        .await;
    assert_eq!(result, Err(LimitEstimationError::ServiceUnavailable));
}

#[tokio::test]
async fn minimum_needs_balance_for_amount_and_fee() {
    let f = funded(1_500);
    f.limit(Some(1_000), true);
    f.h.engine.set_fallback_fee(f.basis(1_000));

    let result = f
        .wallet
        .estimate_limit_minimum_async(target(), f.fee.clone())
        .await;
    assert_eq!(result, Err(LimitEstimationError::InsufficientFunds));
}

#[tokio::test]
async fn minimum_without_fee_estimate_is_the_engine_amount() {
    let f = funded(5_000);
    f.limit(Some(546), false);

    let min = f
        .wallet
        .estimate_limit_minimum_async(target(), f.fee.clone())
        .await
        .unwrap();
    assert_eq!(base_units(&min), "546");
    assert_eq!(f.fee_estimates(), 0);
}

#[tokio::test]
async fn missing_engine_amount_is_insufficient_funds() {
    let f = funded(5_000);
    f.limit(None, true);
    let result = f
        .wallet
        .estimate_limit_maximum_async(target(), f.fee.clone())
        .await;
    assert_eq!(result, Err(LimitEstimationError::InsufficientFunds));
}

#[tokio::test]
async fn empty_wallet_cannot_pay_fees() {
    let f = funded(0);
    f.limit(Some(0), true);
    let result = f
        .wallet
        .estimate_limit_maximum_async(target(), f.fee.clone())
        .await;
    assert_eq!(result, Err(LimitEstimationError::InsufficientFunds));
}

#[tokio::test]
async fn fee_estimate_resolves_through_wallet_event() {
    let f = funded(10_000);
    f.h.engine.push_fee_replies([Ok(f.basis(2_000))]);

    let basis = f
        .wallet
        .estimate_fee_async(&target(), &f.sats(5_000), &f.fee)
        .await
        .unwrap();
    assert_eq!(base_units(&basis.fee().unwrap()), "2000");
    assert!(f.h.engine.calls().iter().any(|c| matches!(
        c,
        EngineCall::EstimateFeeBasis { wallet, .. } if *wallet == f.wallet.handle()
    )));
}

#[tokio::test]
async fn fee_estimate_completes_after_wallet_is_deleted() {
    let f = funded(10_000);
    let manager = f.wallet.manager().unwrap();
    f.h.engine
        .emit_wallet_event(manager.handle(), f.wallet.handle(), EngineWalletEvent::Deleted);
    f.h.wait_for(|seen| matches!(seen, Seen::Wallet(_, WalletEvent::Deleted)));
    assert!(manager.wallet_by_handle(f.wallet.handle()).is_none());

    f.h.engine.push_fee_replies([Ok(f.basis(3_000))]);
    let basis = tokio::time::timeout(
        TIMEOUT,
        f.wallet.estimate_fee_async(&target(), &f.sats(5_000), &f.fee),
    )
    .await
    .expect("estimate never completed")
    .unwrap();
    assert_eq!(base_units(&basis.fee().unwrap()), "3000");
    assert_eq!(f.h.system.metrics().events_dropped.get(), 0);
}
