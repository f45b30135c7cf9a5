//! Folding the fee leg of a remote transaction into its transfers.

use tracing::warn;
use walletkit_blockchaindb::{AmountModel, Transaction, TransferModel};

/// Target address of a transfer fabricated to carry an unmatched fee.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Pair every transfer of `transaction` that touches one of `addresses` with
/// the fee it carries, if any.
///
/// The fee leg (target `__fee__`) is attached to the first non-fee transfer
/// with the same transaction id and source. When there is no such transfer
/// a placeholder to [`UNKNOWN_ADDRESS`] with amount `0` carries the fee so
/// that it is never lost.
pub fn merge_transfers(
    transaction: &Transaction,
    addresses: &[String],
) -> Vec<(TransferModel, Option<String>)> {
    let transfers: Vec<&TransferModel> = transaction
        .transfers
        .iter()
        .filter(|t| addresses.iter().any(|a| t.touches(a)))
        .collect();

    let (with_fee, without_fee): (Vec<&TransferModel>, Vec<&TransferModel>) =
        transfers.into_iter().partition(|t| t.is_fee());

    let Some(fee_transfer) = with_fee.first().copied() else {
        return without_fee.into_iter().map(|t| (t.clone(), None)).collect();
    };
    if with_fee.len() > 1 {
        warn!(
            transaction = %transaction.id,
            count = with_fee.len(),
            "multiple fee transfers; using the first"
        );
    }

    let matching = without_fee
        .iter()
        .find(|t| t.transaction_id == fee_transfer.transaction_id && t.from == fee_transfer.from)
        .map(|t| t.id.clone());

    let mut merged: Vec<TransferModel> = without_fee.into_iter().cloned().collect();
    let fee_target = match matching {
        Some(id) => id,
        None => {
            merged.push(TransferModel {
                to: Some(UNKNOWN_ADDRESS.to_string()),
                amount: AmountModel {
                    currency_id: fee_transfer.amount.currency_id.clone(),
                    amount: "0".to_string(),
                },
                ..fee_transfer.clone()
            });
            fee_transfer.id.clone()
        }
    };

    let fee = fee_transfer.amount.amount.clone();
    merged
        .into_iter()
        .map(|t| {
            let carried = (t.id == fee_target).then(|| fee.clone());
            (t, carried)
        })
        .collect()
}
