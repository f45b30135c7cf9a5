//! Nullable query service: scripted replies, completed synchronously.

use std::collections::HashMap;

use parking_lot::Mutex;
use walletkit_blockchaindb::{
    Blockchain, BlockchainDb, Completion, CurrencyModel, EthToken, QueryError, Transaction,
    TransactionQuery, TransferModel,
};

/// A query service that answers from scripted data.
///
/// Every completion runs before the request method returns. Anything not
/// scripted fails with [`QueryError::Unavailable`].
pub struct NullBlockchainDb {
    blockchains: Mutex<Result<Vec<Blockchain>, QueryError>>,
    currencies: Mutex<HashMap<String, Result<Vec<CurrencyModel>, QueryError>>>,
    transactions: Mutex<Result<Vec<Transaction>, QueryError>>,
    submit_result: Mutex<Result<(), QueryError>>,
    eth_replies: Mutex<HashMap<&'static str, Result<String, QueryError>>>,
    tokens: Mutex<Result<Vec<EthToken>, QueryError>>,
    /// Method name and main argument of every request, in order.
    requests: Mutex<Vec<(String, String)>>,
    submitted: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl NullBlockchainDb {
    pub fn new() -> Self {
        Self {
            blockchains: Mutex::new(Err(QueryError::Unavailable)),
            currencies: Mutex::new(HashMap::new()),
            transactions: Mutex::new(Ok(Vec::new())),
            submit_result: Mutex::new(Ok(())),
            eth_replies: Mutex::new(HashMap::new()),
            tokens: Mutex::new(Err(QueryError::Unavailable)),
            requests: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    // ── Scripting ───────────────────────────────────────────────────────

    pub fn set_blockchains(&self, result: Result<Vec<Blockchain>, QueryError>) {
        *self.blockchains.lock() = result;
    }

    pub fn set_currencies(&self, blockchain_id: &str, result: Result<Vec<CurrencyModel>, QueryError>) {
        self.currencies.lock().insert(blockchain_id.to_string(), result);
    }

    pub fn set_transactions(&self, result: Result<Vec<Transaction>, QueryError>) {
        *self.transactions.lock() = result;
    }

    pub fn set_submit_result(&self, result: Result<(), QueryError>) {
        *self.submit_result.lock() = result;
    }

    /// Script the reply of one JSON-RPC method (`eth_getBalance`,
    /// `eth_gasPrice`, `eth_estimateGas`, `eth_getTransactionCount`,
    /// `eth_blockNumber`, `eth_call`).
    pub fn set_eth_reply(&self, method: &'static str, result: Result<String, QueryError>) {
        self.eth_replies.lock().insert(method, result);
    }

    pub fn set_tokens(&self, result: Result<Vec<EthToken>, QueryError>) {
        *self.tokens.lock() = result;
    }

    // ── Inspection ──────────────────────────────────────────────────────

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }

    /// Blockchain id, hash and bytes of every submitted transaction.
    pub fn submitted(&self) -> Vec<(String, String, Vec<u8>)> {
        self.submitted.lock().clone()
    }

    fn record(&self, method: &str, arg: &str) {
        self.requests.lock().push((method.to_string(), arg.to_string()));
    }

    fn eth_reply(&self, method: &'static str) -> Result<String, QueryError> {
        self.eth_replies
            .lock()
            .get(method)
            .cloned()
            .unwrap_or(Err(QueryError::Unavailable))
    }
}

impl Default for NullBlockchainDb {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockchainDb for NullBlockchainDb {
    fn get_blockchains(&self, is_mainnet: bool, completion: Completion<Vec<Blockchain>>) {
        self.record("get_blockchains", &is_mainnet.to_string());
        let result = self.blockchains.lock().clone();
        completion(result.map(|chains| {
            chains
                .into_iter()
                .filter(|c| c.is_mainnet == is_mainnet)
                .collect()
        }));
    }

    fn get_blockchain(&self, id: &str, completion: Completion<Blockchain>) {
        self.record("get_blockchain", id);
        let result = self.blockchains.lock().clone();
        completion(result.and_then(|chains| {
            chains
                .into_iter()
                .find(|c| c.id == id)
                .ok_or(QueryError::NoData)
        }));
    }

    fn get_currencies(&self, blockchain_id: &str, completion: Completion<Vec<CurrencyModel>>) {
        self.record("get_currencies", blockchain_id);
        let result = self
            .currencies
            .lock()
            .get(blockchain_id)
            .cloned()
            .unwrap_or(Err(QueryError::Unavailable));
        completion(result);
    }

    fn get_transactions(&self, query: TransactionQuery, completion: Completion<Vec<Transaction>>) {
        self.record("get_transactions", &query.blockchain_id);
        let result = self.transactions.lock().clone();
        completion(result.map(|txs| {
            txs.into_iter()
                .filter(|tx| tx.blockchain_id == query.blockchain_id)
                .map(|mut tx| {
                    if !query.include_raw {
                        tx.raw = None;
                    }
                    tx
                })
                .collect()
        }));
    }

    fn get_transfers(&self, query: TransactionQuery, completion: Completion<Vec<TransferModel>>) {
        self.record("get_transfers", &query.blockchain_id);
        let result = self.transactions.lock().clone();
        completion(result.map(|txs| {
            txs.into_iter()
                .filter(|tx| tx.blockchain_id == query.blockchain_id)
                .flat_map(|tx| tx.transfers)
                .filter(|t| query.addresses.iter().any(|a| t.touches(a)))
                .collect()
        }));
    }

    fn create_transaction(
        &self,
        blockchain_id: &str,
        hash_hex: &str,
        data: &[u8],
        completion: Completion<()>,
    ) {
        self.record("create_transaction", hash_hex);
        self.submitted
            .lock()
            .push((blockchain_id.to_string(), hash_hex.to_string(), data.to_vec()));
        let result = self.submit_result.lock().clone();
        completion(result);
    }

    fn eth_balance(&self, network: &str, _address: &str, completion: Completion<String>) {
        self.record("eth_getBalance", network);
        completion(self.eth_reply("eth_getBalance"));
    }

    fn eth_token_balance(
        &self,
        network: &str,
        _address: &str,
        _contract: &str,
        completion: Completion<String>,
    ) {
        self.record("eth_call", network);
        completion(self.eth_reply("eth_call"));
    }

    fn eth_gas_price(&self, network: &str, completion: Completion<String>) {
        self.record("eth_gasPrice", network);
        completion(self.eth_reply("eth_gasPrice"));
    }

    fn eth_estimate_gas(
        &self,
        network: &str,
        _from: &str,
        _to: &str,
        _amount: &str,
        _data: &str,
        completion: Completion<String>,
    ) {
        self.record("eth_estimateGas", network);
        completion(self.eth_reply("eth_estimateGas"));
    }

    fn eth_nonce(&self, network: &str, _address: &str, completion: Completion<String>) {
        self.record("eth_getTransactionCount", network);
        completion(self.eth_reply("eth_getTransactionCount"));
    }

    fn eth_block_number(&self, network: &str, completion: Completion<String>) {
        self.record("eth_blockNumber", network);
        completion(self.eth_reply("eth_blockNumber"));
    }

    fn eth_tokens(&self, completion: Completion<Vec<EthToken>>) {
        self.record("eth_tokens", "");
        let result = self.tokens.lock().clone();
        completion(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn chain(id: &str, is_mainnet: bool) -> Blockchain {
        Blockchain {
            id: id.into(),
            name: id.into(),
            network: "mainnet".into(),
            is_mainnet,
            currency_id: "btc".into(),
            block_height: Some(1),
            fee_estimates: Vec::new(),
            confirmations_until_final: 6,
        }
    }

    #[test]
    fn unscripted_requests_are_unavailable() {
        let db = NullBlockchainDb::new();
        let (tx, rx) = mpsc::channel();
        db.get_currencies("bitcoin-mainnet", Box::new(move |r| tx.send(r).unwrap()));
        assert_eq!(rx.try_recv().unwrap(), Err(QueryError::Unavailable));
        assert_eq!(db.requests(), vec![("get_currencies".to_string(), "bitcoin-mainnet".to_string())]);
    }

    #[test]
    fn blockchains_are_filtered_by_network_kind() {
        let db = NullBlockchainDb::new();
        db.set_blockchains(Ok(vec![chain("bitcoin-mainnet", true), chain("bitcoin-testnet", false)]));
        let (tx, rx) = mpsc::channel();
        db.get_blockchains(false, Box::new(move |r| tx.send(r).unwrap()));
        let chains = rx.try_recv().unwrap().unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].id, "bitcoin-testnet");
    }

    #[test]
    fn submissions_are_recorded() {
        let db = NullBlockchainDb::new();
        let (tx, rx) = mpsc::channel();
        db.create_transaction("bitcoin-mainnet", "abcd", &[1, 2], Box::new(move |r| tx.send(r).unwrap()));
        assert_eq!(rx.try_recv().unwrap(), Ok(()));
        assert_eq!(db.submitted(), vec![("bitcoin-mainnet".into(), "abcd".into(), vec![1, 2])]);
    }
}
