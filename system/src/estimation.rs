//! Maximum-spendable search when the fee is paid in the spent currency.
//!
//! The fee depends on the amount and the amount on the fee, so the search
//! re-estimates the fee for `original - fee` until two consecutive
//! estimates agree. It gives up after [`MAX_ITERATIONS`] replies.

use walletkit_types::{Amount, LimitEstimationError};

pub const MAX_ITERATIONS: usize = 3;

/// What to do after a fee estimate arrives.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Estimate the fee again for this amount.
    Estimate(Amount),
    Done(Result<Amount, LimitEstimationError>),
}

#[derive(Clone, Debug)]
pub struct MaximumSearch {
    original: Amount,
    balance: Amount,
    previous_fee: Amount,
    iterations: usize,
}

impl MaximumSearch {
    /// `original` is the engine's balance-clamped first pass.
    pub fn new(original: Amount, balance: Amount) -> Self {
        let previous_fee = Amount::create_i64(0, original.unit().clone());
        Self {
            original,
            balance,
            previous_fee,
            iterations: 0,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn on_fee(&mut self, fee: &Amount) -> Step {
        self.iterations += 1;

        let Some(candidate) = self.original.sub(fee) else {
            return Step::Done(Err(LimitEstimationError::ServiceFailure));
        };
        if candidate.is_negative() {
            return Step::Done(Err(LimitEstimationError::InsufficientFunds));
        }

        if self.previous_fee == *fee {
            return Step::Done(settle(&self.balance, candidate, fee));
        }
        if self.iterations < MAX_ITERATIONS {
            self.previous_fee = fee.clone();
            return Step::Estimate(candidate);
        }
        Step::Done(Err(LimitEstimationError::ServiceFailure))
    }
}

/// Succeed with `amount` when `balance` covers `amount + fee`.
pub fn settle(balance: &Amount, amount: Amount, fee: &Amount) -> Result<Amount, LimitEstimationError> {
    let total = amount.add(fee).ok_or(LimitEstimationError::ServiceFailure)?;
    match balance.compare(&total) {
        Some(std::cmp::Ordering::Less) => Err(LimitEstimationError::InsufficientFunds),
        Some(_) => Ok(amount),
        None => Err(LimitEstimationError::ServiceFailure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use walletkit_types::{Currency, Unit};

    fn sat() -> Unit {
        let btc = Currency::new("btc", "Bitcoin", "btc", "native", None);
        Unit::base(btc, "btc:sat", "Satoshi", "sat")
    }

    fn sats(v: i64) -> Amount {
        Amount::create_i64(v, sat())
    }

    #[test]
    fn constant_fee_converges_after_one_reestimate() {
        let mut search = MaximumSearch::new(sats(1_000_000), sats(1_000_000));
        assert_eq!(search.on_fee(&sats(1_000)), Step::Estimate(sats(999_000)));
        assert_eq!(search.on_fee(&sats(1_000)), Step::Done(Ok(sats(999_000))));
        assert_eq!(search.iterations(), 2);
    }

    #[test]
    fn drifting_fee_fails_with_service_failure() {
        let mut search = MaximumSearch::new(sats(1_000_000), sats(1_000_000));
        assert!(matches!(search.on_fee(&sats(1_000)), Step::Estimate(_)));
        assert!(matches!(search.on_fee(&sats(1_100)), Step::Estimate(_)));
        assert_eq!(
            search.on_fee(&sats(1_200)),
            Step::Done(Err(LimitEstimationError::ServiceFailure))
        );
    }

    #[test]
    fn fee_above_amount_is_insufficient_funds() {
        let mut search = MaximumSearch::new(sats(500), sats(500));
        assert_eq!(
            search.on_fee(&sats(1_000)),
            Step::Done(Err(LimitEstimationError::InsufficientFunds))
        );
    }

    #[test]
    fn zero_fee_converges_immediately() {
        let mut search = MaximumSearch::new(sats(10), sats(10));
        assert_eq!(search.on_fee(&sats(0)), Step::Done(Ok(sats(10))));
    }

    #[test]
    fn settle_requires_amount_plus_fee() {
        assert_eq!(settle(&sats(100), sats(90), &sats(10)), Ok(sats(90)));
        assert_eq!(
            settle(&sats(99), sats(90), &sats(10)),
            Err(LimitEstimationError::InsufficientFunds)
        );
    }

    proptest! {
        #[test]
        fn never_exceeds_iteration_budget(fees in proptest::collection::vec(0i64..5_000, 1..10)) {
            let mut search = MaximumSearch::new(sats(1_000_000), sats(1_000_000));
            let mut done = false;
            for fee in &fees {
                match search.on_fee(&sats(*fee)) {
                    Step::Estimate(_) => prop_assert!(search.iterations() < MAX_ITERATIONS),
                    Step::Done(result) => {
                        if let Ok(amount) = result {
                            prop_assert_eq!(amount, sats(1_000_000 - fee));
                        }
                        done = true;
                        break;
                    }
                }
            }
            if fees.len() >= MAX_ITERATIONS {
                prop_assert!(done);
            }
        }
    }
}
