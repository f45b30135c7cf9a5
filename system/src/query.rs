//! Outbound engine queries, handled on the query pump.
//!
//! Each request is forwarded to the query service and its reply is
//! announced back to the engine exactly once, success or failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walletkit_blockchaindb::{QueryError, Transaction, TransactionQuery};
use walletkit_types::{ManagerHandle, SystemToken};

use crate::engine::{
    CallbackState, QueryReply, QueryRequest, TransactionBundle, TransactionStatus, TransferBundle,
};
use crate::registry;
use crate::system::System;
use crate::tracing_spans::query_span;
use crate::transfer_merge::merge_transfers;

/// Send `result` back to the engine, counting failures.
fn announce(system: &System, manager: ManagerHandle, state: CallbackState, result: Result<QueryReply, QueryError>) {
    if let Err(e) = &result {
        debug!(system = %system.token(), %manager, error = %e, "query failed");
        system.metrics().queries_failed.inc();
    }
    system.engine().announce(manager, state, result);
}

/// Network name the JSON-RPC proxy expects: the suffix of the blockchain id
/// (`ethereum-mainnet` → `mainnet`).
fn eth_network_name(blockchain_id: &str) -> &str {
    blockchain_id
        .rsplit_once('-')
        .map_or(blockchain_id, |(_, name)| name)
}

fn unix_seconds(at: Option<&DateTime<Utc>>) -> u64 {
    at.map_or(0, |t| u64::try_from(t.timestamp()).unwrap_or(0))
}

fn transaction_time(transaction: &Transaction) -> u64 {
    unix_seconds(transaction.timestamp.as_ref().or(transaction.first_seen.as_ref()))
}

fn status_of(transaction: &Transaction) -> Result<TransactionStatus, QueryError> {
    TransactionStatus::from_remote(&transaction.status).ok_or_else(|| {
        QueryError::Model(format!(
            "transaction {} has unusable status {}",
            transaction.id, transaction.status
        ))
    })
}

/// Every transaction must carry a known status and its raw bytes, otherwise
/// the whole batch fails.
pub(crate) fn transaction_bundles(transactions: Vec<Transaction>) -> Result<Vec<TransactionBundle>, QueryError> {
    transactions
        .into_iter()
        .map(|transaction| {
            let status = status_of(&transaction)?;
            let timestamp = transaction_time(&transaction);
            let block_height = transaction.block_height.unwrap_or(0);
            let raw = transaction.raw.ok_or_else(|| {
                QueryError::Model(format!("transaction {} has no raw bytes", transaction.id))
            })?;
            Ok(TransactionBundle {
                status,
                raw,
                timestamp,
                block_height,
            })
        })
        .collect()
}

pub(crate) fn transfer_bundles(
    transactions: &[Transaction],
    addresses: &[String],
) -> Result<Vec<TransferBundle>, QueryError> {
    let mut bundles = Vec::new();
    for transaction in transactions {
        let status = status_of(transaction)?;
        let timestamp = transaction_time(transaction);
        let block_height = transaction.block_height.unwrap_or(0);
        for (transfer, fee) in merge_transfers(transaction, addresses) {
            let mut meta: Vec<(String, String)> = transfer.meta.into_iter().collect();
            meta.sort();
            bundles.push(TransferBundle {
                status,
                uids: transfer.id,
                hash: transaction.hash.clone(),
                identifier: transaction.identifier.clone(),
                from: transfer.from.unwrap_or_default(),
                to: transfer.to.unwrap_or_default(),
                amount: transfer.amount.amount,
                currency: transfer.amount.currency_id,
                fee,
                timestamp,
                block_height,
                transfer_index: transfer.index,
                meta,
            });
        }
    }
    Ok(bundles)
}

pub(crate) fn handle_request(
    token: SystemToken,
    manager: ManagerHandle,
    state: CallbackState,
    request: QueryRequest,
) {
    let Some(system) = registry::lookup(token) else {
        match registry::lookup_retained(token) {
            Some(retained) => retained
                .engine()
                .announce(manager, state, Err(QueryError::Unavailable)),
            None => debug!(system = %token, %manager, "query for unknown system dropped"),
        }
        return;
    };
    let _span = query_span(token, request.name()).entered();

    let Some(wallet_manager) = system.manager_by_handle(manager) else {
        warn!(system = %token, %manager, "query for unknown manager");
        announce(&system, manager, state, Err(QueryError::Other(format!("unknown manager {manager}"))));
        return;
    };
    system.metrics().queries_issued.inc();

    let blockchain_id = wallet_manager.network().uids().to_string();
    let query = Arc::clone(system.query());
    let reply = move |result: Result<QueryReply, QueryError>| announce(&system, manager, state, result);

    match request {
        QueryRequest::GetBlockNumber => query.get_blockchain(
            &blockchain_id,
            Box::new(move |result| {
                reply(result.and_then(|chain| {
                    chain
                        .block_height
                        .map(QueryReply::BlockNumber)
                        .ok_or(QueryError::NoData)
                }))
            }),
        ),
        QueryRequest::GetTransactions {
            addresses,
            begin_block,
            end_block,
        } => query.get_transactions(
            TransactionQuery {
                blockchain_id,
                addresses,
                begin_block,
                end_block,
                include_raw: true,
            },
            Box::new(move |result| {
                reply(result.and_then(|txs| transaction_bundles(txs).map(QueryReply::Transactions)))
            }),
        ),
        QueryRequest::GetTransfers {
            addresses,
            begin_block,
            end_block,
        } => {
            let wanted = addresses.clone();
            query.get_transactions(
                TransactionQuery {
                    blockchain_id,
                    addresses,
                    begin_block,
                    end_block,
                    include_raw: false,
                },
                Box::new(move |result| {
                    reply(result.and_then(|txs| transfer_bundles(&txs, &wanted).map(QueryReply::Transfers)))
                }),
            )
        }
        QueryRequest::SubmitTransaction {
            transaction,
            hash_hex,
        } => query.create_transaction(
            &blockchain_id,
            &hash_hex,
            &transaction,
            Box::new(move |result| reply(result.map(|()| QueryReply::Submitted))),
        ),
        QueryRequest::GetBalance { address } => query.eth_balance(
            eth_network_name(&blockchain_id),
            &address,
            Box::new(move |result| reply(result.map(QueryReply::Balance))),
        ),
        QueryRequest::GetTokenBalance { address, contract } => query.eth_token_balance(
            eth_network_name(&blockchain_id),
            &address,
            &contract,
            Box::new(move |result| reply(result.map(QueryReply::Balance))),
        ),
        QueryRequest::GetGasPrice => query.eth_gas_price(
            eth_network_name(&blockchain_id),
            Box::new(move |result| reply(result.map(QueryReply::GasPrice))),
        ),
        QueryRequest::EstimateGas {
            from,
            to,
            amount,
            data,
        } => query.eth_estimate_gas(
            eth_network_name(&blockchain_id),
            &from,
            &to,
            &amount,
            &data,
            Box::new(move |result| reply(result.map(QueryReply::GasEstimate))),
        ),
        QueryRequest::GetNonce { address } => query.eth_nonce(
            eth_network_name(&blockchain_id),
            &address,
            Box::new(move |result| reply(result.map(QueryReply::Nonce))),
        ),
        QueryRequest::GetTokens => {
            query.eth_tokens(Box::new(move |result| reply(result.map(QueryReply::Tokens))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use walletkit_blockchaindb::{AmountModel, TransferModel};

    fn transaction(status: &str, raw: Option<Vec<u8>>) -> Transaction {
        Transaction {
            id: "bitcoin-mainnet:tx1".into(),
            blockchain_id: "bitcoin-mainnet".into(),
            hash: "abcd".into(),
            identifier: "abcd".into(),
            status: status.into(),
            block_height: Some(600_000),
            block_hash: None,
            index: Some(3),
            confirmations: Some(2),
            size: 250,
            timestamp: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            first_seen: None,
            raw,
            fee: None,
            transfers: vec![TransferModel {
                id: "bitcoin-mainnet:tx1:0".into(),
                blockchain_id: "bitcoin-mainnet".into(),
                index: 0,
                amount: AmountModel {
                    currency_id: "bitcoin-mainnet:__native__".into(),
                    amount: "5000".into(),
                },
                from: Some("alice".into()),
                to: Some("bob".into()),
                transaction_id: Some("bitcoin-mainnet:tx1".into()),
                acknowledgements: None,
                meta: Default::default(),
            }],
        }
    }

    #[test]
    fn eth_network_name_is_blockchain_suffix() {
        assert_eq!(eth_network_name("ethereum-mainnet"), "mainnet");
        assert_eq!(eth_network_name("ethereum-ropsten"), "ropsten");
        assert_eq!(eth_network_name("ethereum"), "ethereum");
    }

    #[test]
    fn confirmed_transaction_becomes_included_bundle() {
        let bundles = transaction_bundles(vec![transaction("confirmed", Some(vec![1, 2, 3]))]).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].status, TransactionStatus::Included);
        assert_eq!(bundles[0].raw, vec![1, 2, 3]);
        assert_eq!(bundles[0].timestamp, 1_577_836_800);
        assert_eq!(bundles[0].block_height, 600_000);
    }

    #[test]
    fn unknown_status_fails_the_batch() {
        let txs = vec![
            transaction("confirmed", Some(vec![1])),
            transaction("reverted", Some(vec![2])),
        ];
        assert!(matches!(transaction_bundles(txs), Err(QueryError::Model(_))));
    }

    #[test]
    fn missing_raw_fails_the_batch() {
        assert!(transaction_bundles(vec![transaction("submitted", None)]).is_err());
    }

    #[test]
    fn transfers_are_bundled_per_address() {
        let txs = vec![transaction("submitted", None)];
        let bundles = transfer_bundles(&txs, &["bob".to_string()]).unwrap();
        assert_eq!(bundles.len(), 1);
        let bundle = &bundles[0];
        assert_eq!(bundle.status, TransactionStatus::Submitted);
        assert_eq!(bundle.hash, "abcd");
        assert_eq!(bundle.from, "alice");
        assert_eq!(bundle.to, "bob");
        assert_eq!(bundle.amount, "5000");
        assert_eq!(bundle.fee, None);

        assert!(transfer_bundles(&txs, &["carol".to_string()]).unwrap().is_empty());
    }
}
