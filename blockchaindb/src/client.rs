//! Query-service trait and its HTTP implementation.

use std::time::Duration;

use base64::Engine;
use futures_util::future::try_join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::models::{Blockchain, CurrencyModel, Embedded, EthToken, Transaction, TransferModel};
use crate::QueryError;

/// Receives the outcome of one request, exactly once.
pub type Completion<T> = Box<dyn FnOnce(Result<T, QueryError>) + Send + 'static>;

/// Parameters for transaction and transfer history queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionQuery {
    pub blockchain_id: String,
    pub addresses: Vec<String>,
    pub begin_block: Option<u64>,
    pub end_block: Option<u64>,
    pub include_raw: bool,
}

/// Asynchronous access to the remote query service.
///
/// Implementations must never invoke a completion more than once and must
/// not block the calling thread.
pub trait BlockchainDb: Send + Sync {
    fn get_blockchains(&self, is_mainnet: bool, completion: Completion<Vec<Blockchain>>);

    fn get_blockchain(&self, id: &str, completion: Completion<Blockchain>);

    fn get_currencies(&self, blockchain_id: &str, completion: Completion<Vec<CurrencyModel>>);

    fn get_transactions(&self, query: TransactionQuery, completion: Completion<Vec<Transaction>>);

    fn get_transfers(&self, query: TransactionQuery, completion: Completion<Vec<TransferModel>>);

    fn create_transaction(
        &self,
        blockchain_id: &str,
        hash_hex: &str,
        data: &[u8],
        completion: Completion<()>,
    );

    // ── Ethereum JSON-RPC proxy ─────────────────────────────────────────

    fn eth_balance(&self, network: &str, address: &str, completion: Completion<String>);

    fn eth_token_balance(
        &self,
        network: &str,
        address: &str,
        contract: &str,
        completion: Completion<String>,
    );

    fn eth_gas_price(&self, network: &str, completion: Completion<String>);

    fn eth_estimate_gas(
        &self,
        network: &str,
        from: &str,
        to: &str,
        amount: &str,
        data: &str,
        completion: Completion<String>,
    );

    fn eth_nonce(&self, network: &str, address: &str, completion: Completion<String>);

    fn eth_block_number(&self, network: &str, completion: Completion<String>);

    fn eth_tokens(&self, completion: Completion<Vec<EthToken>>);
}

// ── HttpBlockchainDb ────────────────────────────────────────────────────

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ADDRESS_CHUNK: usize = 50;

/// [`BlockchainDb`] over HTTP.
///
/// Requests run on the supplied tokio runtime; completions are invoked from
/// that runtime's worker threads.
#[derive(Clone)]
pub struct HttpBlockchainDb {
    http: reqwest::Client,
    bdb_url: String,
    api_url: String,
    token: Option<String>,
    address_chunk: usize,
    runtime: tokio::runtime::Handle,
}

impl HttpBlockchainDb {
    /// Create a client for the given query-service and API base URLs.
    pub fn new(
        bdb_url: impl Into<String>,
        api_url: impl Into<String>,
        token: Option<String>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, QueryError> {
        Self::with_timeout(bdb_url, api_url, token, runtime, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        bdb_url: impl Into<String>,
        api_url: impl Into<String>,
        token: Option<String>,
        runtime: tokio::runtime::Handle,
        timeout_secs: u64,
    ) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| QueryError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            bdb_url: bdb_url.into().trim_end_matches('/').to_string(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            address_chunk: DEFAULT_ADDRESS_CHUNK,
            runtime,
        })
    }

    /// Maximum number of addresses sent in one history request.
    pub fn with_address_chunk(mut self, chunk: usize) -> Self {
        self.address_chunk = chunk.max(1);
        self
    }

    pub fn bdb_url(&self) -> &str {
        &self.bdb_url
    }

    fn spawn<T, F>(&self, completion: Completion<T>, fut: F)
    where
        T: Send + 'static,
        F: std::future::Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        self.runtime.spawn(async move {
            completion(fut.await);
        });
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<serde_json::Value, QueryError> {
        debug!(url, "query: GET");
        let response = self
            .authorize(self.http.get(url).query(params))
            .send()
            .await
            .map_err(|e| QueryError::Submission(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, QueryError> {
        debug!(url, "query: POST");
        let response = self
            .authorize(self.http.post(url).json(body))
            .send()
            .await
            .map_err(|e| QueryError::Submission(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, QueryError> {
        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "query: response failed");
            return Err(QueryError::BadResponse(status.as_u16()));
        }
        let text = response
            .text()
            .await
            .map_err(|e| QueryError::Submission(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| QueryError::Model(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, QueryError> {
        serde_json::from_value(value).map_err(|e| QueryError::Model(e.to_string()))
    }

    /// Fetch a HAL list, following `next` links until exhausted.
    async fn get_embedded<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<T>, QueryError> {
        let mut out = Vec::new();
        let mut url = format!("{}/{}", self.bdb_url, path);
        let mut params = params;
        loop {
            let value = self.get_json(&url, &params).await?;
            if value.is_null() {
                break;
            }
            let page: Embedded = Self::decode(value)?;
            if let Some(items) = page.embedded.get(key) {
                let items: Vec<T> = Self::decode(items.clone())?;
                out.extend(items);
            }
            match page.links.and_then(|l| l.next) {
                Some(next) => {
                    url = next.href;
                    params = Vec::new();
                }
                None => break,
            }
        }
        Ok(out)
    }

    fn history_params(query: &TransactionQuery, chunk: &[String]) -> Vec<(String, String)> {
        let mut params = vec![
            ("blockchain_id".to_string(), query.blockchain_id.clone()),
            ("include_raw".to_string(), query.include_raw.to_string()),
            ("include_proof".to_string(), "false".to_string()),
        ];
        if let Some(begin) = query.begin_block {
            params.push(("start_height".to_string(), begin.to_string()));
        }
        if let Some(end) = query.end_block {
            params.push(("end_height".to_string(), end.to_string()));
        }
        for address in chunk {
            params.push(("address".to_string(), address.clone()));
        }
        params
    }

    async fn fetch_history<T: DeserializeOwned>(
        &self,
        path: &str,
        query: TransactionQuery,
    ) -> Result<Vec<T>, QueryError> {
        let pages = query
            .addresses
            .chunks(self.address_chunk)
            .map(|chunk| self.get_embedded::<T>(path, path, Self::history_params(&query, chunk)));
        let pages = try_join_all(pages).await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn eth_rpc(&self, network: &str, method: &str, params: serde_json::Value) -> Result<String, QueryError> {
        let url = format!("{}/ethq/{}/proxy", self.api_url, network);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        let json = self.post_json(&url, &body).await?;
        if let Some(err) = json.get("error") {
            return Err(QueryError::Other(format!("rpc error: {err}")));
        }
        json.get("result")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or(QueryError::NoData)
    }
}

impl BlockchainDb for HttpBlockchainDb {
    fn get_blockchains(&self, is_mainnet: bool, completion: Completion<Vec<Blockchain>>) {
        let this = self.clone();
        self.spawn(completion, async move {
            let params = vec![("testnet".to_string(), (!is_mainnet).to_string())];
            this.get_embedded("blockchains", "blockchains", params).await
        });
    }

    fn get_blockchain(&self, id: &str, completion: Completion<Blockchain>) {
        let this = self.clone();
        let url = format!("{}/blockchains/{}", self.bdb_url, id);
        self.spawn(completion, async move {
            let value = this.get_json(&url, &[]).await?;
            if value.is_null() {
                return Err(QueryError::NoData);
            }
            Self::decode(value)
        });
    }

    fn get_currencies(&self, blockchain_id: &str, completion: Completion<Vec<CurrencyModel>>) {
        let this = self.clone();
        let params = vec![
            ("blockchain_id".to_string(), blockchain_id.to_string()),
            ("verified".to_string(), "true".to_string()),
        ];
        self.spawn(completion, async move {
            this.get_embedded("currencies", "currencies", params).await
        });
    }

    fn get_transactions(&self, query: TransactionQuery, completion: Completion<Vec<Transaction>>) {
        let this = self.clone();
        self.spawn(completion, async move {
            this.fetch_history("transactions", query).await
        });
    }

    fn get_transfers(&self, query: TransactionQuery, completion: Completion<Vec<TransferModel>>) {
        let this = self.clone();
        self.spawn(completion, async move {
            this.fetch_history("transfers", query).await
        });
    }

    fn create_transaction(
        &self,
        blockchain_id: &str,
        hash_hex: &str,
        data: &[u8],
        completion: Completion<()>,
    ) {
        let this = self.clone();
        let url = format!("{}/transactions", self.bdb_url);
        let body = serde_json::json!({
            "blockchain_id": blockchain_id,
            "transaction_id": hash_hex,
            "data": base64::engine::general_purpose::STANDARD.encode(data),
        });
        self.spawn(completion, async move {
            this.post_json(&url, &body).await.map(|_| ())
        });
    }

    fn eth_balance(&self, network: &str, address: &str, completion: Completion<String>) {
        let this = self.clone();
        let network = network.to_string();
        let params = serde_json::json!([address, "latest"]);
        self.spawn(completion, async move {
            this.eth_rpc(&network, "eth_getBalance", params).await
        });
    }

    fn eth_token_balance(
        &self,
        network: &str,
        address: &str,
        contract: &str,
        completion: Completion<String>,
    ) {
        let this = self.clone();
        let url = format!("{}/ethq/{}/query", self.api_url, network);
        let params = vec![
            ("module".to_string(), "account".to_string()),
            ("action".to_string(), "tokenbalance".to_string()),
            ("address".to_string(), address.to_string()),
            ("contractaddress".to_string(), contract.to_string()),
        ];
        self.spawn(completion, async move {
            let json = this.get_json(&url, &params).await?;
            json.get("result")
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .ok_or(QueryError::NoData)
        });
    }

    fn eth_gas_price(&self, network: &str, completion: Completion<String>) {
        let this = self.clone();
        let network = network.to_string();
        self.spawn(completion, async move {
            this.eth_rpc(&network, "eth_gasPrice", serde_json::json!([])).await
        });
    }

    fn eth_estimate_gas(
        &self,
        network: &str,
        from: &str,
        to: &str,
        amount: &str,
        data: &str,
        completion: Completion<String>,
    ) {
        let this = self.clone();
        let network = network.to_string();
        let params = serde_json::json!([{
            "from": from,
            "to": to,
            "value": amount,
            "data": data,
        }]);
        self.spawn(completion, async move {
            this.eth_rpc(&network, "eth_estimateGas", params).await
        });
    }

    fn eth_nonce(&self, network: &str, address: &str, completion: Completion<String>) {
        let this = self.clone();
        let network = network.to_string();
        let params = serde_json::json!([address, "latest"]);
        self.spawn(completion, async move {
            this.eth_rpc(&network, "eth_getTransactionCount", params).await
        });
    }

    fn eth_block_number(&self, network: &str, completion: Completion<String>) {
        let this = self.clone();
        let network = network.to_string();
        self.spawn(completion, async move {
            this.eth_rpc(&network, "eth_blockNumber", serde_json::json!([])).await
        });
    }

    fn eth_tokens(&self, completion: Completion<Vec<EthToken>>) {
        let this = self.clone();
        let url = format!("{}/currencies", self.api_url);
        let params = vec![("type".to_string(), "erc20".to_string())];
        self.spawn(completion, async move {
            let value = this.get_json(&url, &params).await?;
            Self::decode(value)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every history request with one item naming the first address
    /// and the number of addresses it carried.
    async fn serve_history(listener: TcpListener, seen: Arc<Mutex<Vec<Vec<String>>>>) {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 4096];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head);
                let target = head.split_whitespace().nth(1).unwrap_or_default();
                let addresses: Vec<String> = target
                    .split(|c| c == '?' || c == '&')
                    .filter_map(|p| p.strip_prefix("address="))
                    .map(str::to_string)
                    .collect();
                let body = serde_json::json!({
                    "_embedded": {
                        "transactions": [{ "first": addresses[0], "count": addresses.len() }]
                    }
                })
                .to_string();
                seen.lock().unwrap().push(addresses);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    }

    #[tokio::test]
    async fn long_address_lists_are_split_and_merged_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(serve_history(listener, Arc::clone(&seen)));

        let client =
            HttpBlockchainDb::with_timeout(&url, &url, None, tokio::runtime::Handle::current(), 5).unwrap();
        let query = TransactionQuery {
            blockchain_id: "bitcoin-mainnet".into(),
            addresses: (0..120).map(|i| format!("addr{i}")).collect(),
            begin_block: None,
            end_block: None,
            include_raw: false,
        };
        let items: Vec<serde_json::Value> = client.fetch_history("transactions", query).await.unwrap();

        let merged: Vec<(String, u64)> = items
            .iter()
            .map(|v| (v["first"].as_str().unwrap().to_string(), v["count"].as_u64().unwrap()))
            .collect();
        assert_eq!(
            merged,
            vec![("addr0".into(), 50), ("addr50".into(), 50), ("addr100".into(), 20)]
        );

        let mut requests = seen.lock().unwrap().clone();
        requests.sort_by_key(|r| r.len());
        assert_eq!(requests.iter().map(Vec::len).collect::<Vec<_>>(), vec![20, 50, 50]);
        let total: usize = requests.iter().map(Vec::len).sum();
        assert_eq!(total, 120);
    }

    #[test]
    fn history_params_carry_range_and_addresses() {
        let query = TransactionQuery {
            blockchain_id: "bitcoin-mainnet".into(),
            addresses: vec!["a".into(), "b".into()],
            begin_block: Some(10),
            end_block: None,
            include_raw: true,
        };
        let params = HttpBlockchainDb::history_params(&query, &query.addresses);
        assert!(params.contains(&("start_height".into(), "10".into())));
        assert!(!params.iter().any(|(k, _)| k == "end_height"));
        assert!(params.contains(&("include_raw".into(), "true".into())));
        assert_eq!(params.iter().filter(|(k, _)| k == "address").count(), 2);
    }

    #[tokio::test]
    async fn unreachable_service_completes_with_error() {
        let client = HttpBlockchainDb::with_timeout(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            None,
            tokio::runtime::Handle::current(),
            2,
        )
        .unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        client.get_blockchains(
            true,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(QueryError::Submission(_))));
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let client =
            HttpBlockchainDb::new("https://bdb.example/", "https://api.example/", None, rt.handle().clone())
                .unwrap()
                .with_address_chunk(0);
        assert_eq!(client.bdb_url(), "https://bdb.example");
        assert_eq!(client.address_chunk, 1);
    }
}
