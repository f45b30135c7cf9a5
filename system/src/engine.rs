//! Boundary to the native sync engine.
//!
//! The engine validates blocks, signs and tracks transactions. The core only
//! talks to it through [`SyncEngine`] and receives its callbacks through the
//! two sinks in [`EngineContext`]. Both sinks enqueue and return at once so
//! engine threads never block on application code.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::trace;

use walletkit_blockchaindb::{EthToken, QueryError};
use walletkit_types::{
    Address, AddressScheme, Amount, Cookie, Currency, FeeEstimationError, ManagerHandle,
    NetworkFee, SyncDepth, SyncMode, SyncStoppedReason, SystemToken, TransferDirection,
    TransferFeeBasis, TransferHandle, TransferState, WalletHandle, WalletManagerState, WalletState,
};

use crate::account::Account;
use crate::executor::{on_event_pump, on_query_pump};
use crate::{dispatch, query};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine could not create manager for {0}")]
    CreateFailed(String),

    #[error("engine does not know {0}")]
    UnknownHandle(String),

    #[error("{0}")]
    Other(String),
}

/// Legacy storage import failures. The first failing blob aborts the batch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MigrateError {
    #[error("migrator could not be created")]
    Create,

    #[error("migration is not valid for this network")]
    Invalid,

    #[error("malformed transaction blob")]
    Transaction,

    #[error("malformed block blob")]
    Block,

    #[error("malformed peer blob")]
    Peer,
}

// ── Engine-side events ──────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum EngineManagerEvent {
    Created,
    Changed {
        old: WalletManagerState,
        new: WalletManagerState,
    },
    Deleted,
    WalletAdded(WalletHandle),
    WalletChanged(WalletHandle),
    WalletDeleted(WalletHandle),
    SyncStarted,
    SyncContinues {
        timestamp: Option<u64>,
        percent_complete: f32,
    },
    SyncStopped(SyncStoppedReason),
    SyncRecommended(SyncDepth),
    BlockHeightUpdated(u64),
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineWalletEvent {
    /// Carries the uids of the currency the wallet holds.
    Created {
        currency_uids: String,
    },
    Changed {
        old: WalletState,
        new: WalletState,
    },
    Deleted,
    TransferAdded(TransferHandle),
    TransferChanged(TransferHandle),
    TransferSubmitted(TransferHandle),
    TransferDeleted(TransferHandle),
    BalanceUpdated(Amount),
    FeeBasisUpdated(TransferFeeBasis),
    FeeBasisEstimated {
        cookie: Cookie,
        result: Result<TransferFeeBasis, FeeEstimationError>,
    },
}

/// Snapshot of a transfer as the engine first reports it.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferRecord {
    pub source: Option<Address>,
    pub target: Option<Address>,
    pub amount: Amount,
    pub direction: TransferDirection,
    pub hash: Option<String>,
    pub estimated_fee_basis: Option<TransferFeeBasis>,
    pub confirmed_fee_basis: Option<TransferFeeBasis>,
    pub state: TransferState,
    pub attributes: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineTransferEvent {
    Created(TransferRecord),
    /// `confirmed_fee_basis` is set once the engine knows the fee actually
    /// paid, typically alongside `Included`.
    Changed {
        old: TransferState,
        new: TransferState,
        confirmed_fee_basis: Option<TransferFeeBasis>,
    },
    Deleted,
}

// ── Outbound queries ────────────────────────────────────────────────────

/// Opaque correlation for one outbound query. Not `Clone`: announcing
/// consumes it, so a reply can be sent at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct CallbackState(u64);

impl CallbackState {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryRequest {
    GetBlockNumber,
    GetTransactions {
        addresses: Vec<String>,
        begin_block: Option<u64>,
        end_block: Option<u64>,
    },
    GetTransfers {
        addresses: Vec<String>,
        begin_block: Option<u64>,
        end_block: Option<u64>,
    },
    SubmitTransaction {
        transaction: Vec<u8>,
        hash_hex: String,
    },
    GetBalance {
        address: String,
    },
    GetTokenBalance {
        address: String,
        contract: String,
    },
    GetGasPrice,
    EstimateGas {
        from: String,
        to: String,
        amount: String,
        data: String,
    },
    GetNonce {
        address: String,
    },
    GetTokens,
}

impl QueryRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetBlockNumber => "get_block_number",
            Self::GetTransactions { .. } => "get_transactions",
            Self::GetTransfers { .. } => "get_transfers",
            Self::SubmitTransaction { .. } => "submit_transaction",
            Self::GetBalance { .. } => "get_balance",
            Self::GetTokenBalance { .. } => "get_token_balance",
            Self::GetGasPrice => "get_gas_price",
            Self::EstimateGas { .. } => "estimate_gas",
            Self::GetNonce { .. } => "get_nonce",
            Self::GetTokens => "get_tokens",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Submitted,
    Included,
    Errored,
}

impl TransactionStatus {
    /// Map a query-service status string. Anything else is `None` and
    /// fails the query that carried it.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status {
            "confirmed" => Some(Self::Included),
            "submitted" => Some(Self::Submitted),
            "failed" => Some(Self::Errored),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionBundle {
    pub status: TransactionStatus,
    pub raw: Vec<u8>,
    pub timestamp: u64,
    pub block_height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferBundle {
    pub status: TransactionStatus,
    pub uids: String,
    pub hash: String,
    pub identifier: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub currency: String,
    pub fee: Option<String>,
    pub timestamp: u64,
    pub block_height: u64,
    pub transfer_index: u64,
    pub meta: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryReply {
    BlockNumber(u64),
    Transactions(Vec<TransactionBundle>),
    Transfers(Vec<TransferBundle>),
    Submitted,
    Balance(String),
    GasPrice(String),
    GasEstimate(String),
    Nonce(String),
    Tokens(Vec<EthToken>),
}

// ── Manager creation ────────────────────────────────────────────────────

/// Everything the engine needs to stand up a wallet manager.
#[derive(Clone, Debug)]
pub struct ManagerSpec {
    pub account: Account,
    pub network_uids: String,
    pub network_name: String,
    pub is_mainnet: bool,
    pub currency: Currency,
    pub height: u64,
    pub confirmations_until_final: u32,
    pub mode: SyncMode,
    pub scheme: AddressScheme,
    pub storage_path: PathBuf,
}

/// First-pass limit from the engine, already clamped to the wallet balance.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineLimitEstimate {
    pub amount: Option<Amount>,
    pub need_fee_estimate: bool,
    pub is_zero_if_insufficient_funds: bool,
}

// ── Sinks handed to the engine ──────────────────────────────────────────

/// Lifecycle callbacks from engine threads. Every call only enqueues.
#[derive(Clone, Debug)]
pub struct EngineListener {
    token: SystemToken,
}

impl EngineListener {
    pub fn token(&self) -> SystemToken {
        self.token
    }

    pub fn manager_event(&self, manager: ManagerHandle, event: EngineManagerEvent) {
        trace!(system = %self.token, %manager, ?event, "engine: manager event");
        let token = self.token;
        on_event_pump(Box::new(move || {
            dispatch::handle_manager_event(token, manager, event)
        }));
    }

    pub fn wallet_event(&self, manager: ManagerHandle, wallet: WalletHandle, event: EngineWalletEvent) {
        trace!(system = %self.token, %manager, %wallet, ?event, "engine: wallet event");
        let token = self.token;
        on_event_pump(Box::new(move || {
            dispatch::handle_wallet_event(token, manager, wallet, event)
        }));
    }

    pub fn transfer_event(
        &self,
        manager: ManagerHandle,
        wallet: WalletHandle,
        transfer: TransferHandle,
        event: EngineTransferEvent,
    ) {
        trace!(system = %self.token, %manager, %wallet, %transfer, ?event, "engine: transfer event");
        let token = self.token;
        on_event_pump(Box::new(move || {
            dispatch::handle_transfer_event(token, manager, wallet, transfer, event)
        }));
    }
}

/// Outbound query requests from engine threads. Every call only enqueues;
/// the reply arrives later through [`SyncEngine::announce`].
#[derive(Clone, Debug)]
pub struct EngineClient {
    token: SystemToken,
}

impl EngineClient {
    pub fn request(&self, manager: ManagerHandle, state: CallbackState, request: QueryRequest) {
        trace!(system = %self.token, %manager, request = request.name(), "engine: query");
        let token = self.token;
        on_query_pump(Box::new(move || {
            query::handle_request(token, manager, state, request)
        }));
    }
}

/// Both sinks, tagged with the owning system's token.
#[derive(Clone, Debug)]
pub struct EngineContext {
    pub listener: EngineListener,
    pub client: EngineClient,
}

impl EngineContext {
    pub(crate) fn new(token: SystemToken) -> Self {
        Self {
            listener: EngineListener { token },
            client: EngineClient { token },
        }
    }

    pub fn token(&self) -> SystemToken {
        self.listener.token
    }
}

// ── Legacy storage ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionBlob {
    pub bytes: Vec<u8>,
    pub block_height: u32,
    pub timestamp: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockBlob {
    pub bytes: Vec<u8>,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerBlob {
    pub address: u32,
    pub port: u16,
    pub services: u64,
    pub timestamp: Option<u32>,
}

/// Writes legacy records into the engine's new storage.
pub trait StorageMigrator: Send {
    fn put_transaction(&mut self, blob: &TransactionBlob) -> Result<(), MigrateError>;
    fn put_block(&mut self, blob: &BlockBlob) -> Result<(), MigrateError>;
    fn put_peer(&mut self, blob: &PeerBlob) -> Result<(), MigrateError>;
}

// ── SyncEngine ──────────────────────────────────────────────────────────

/// The native engine as seen by the core. Handles are owned by the engine
/// and released explicitly once the matching `Deleted` event is processed.
pub trait SyncEngine: Send + Sync {
    fn create_manager(
        &self,
        spec: &ManagerSpec,
        context: EngineContext,
    ) -> Result<ManagerHandle, EngineError>;

    /// Ask the engine to track `currency` under `manager`. The wallet itself
    /// arrives later as a `Created` wallet event.
    fn register_wallet(&self, manager: ManagerHandle, currency: &Currency) -> Option<WalletHandle>;

    fn connect(&self, manager: ManagerHandle);
    fn disconnect(&self, manager: ManagerHandle);
    fn stop(&self, manager: ManagerHandle);
    fn sync(&self, manager: ManagerHandle);
    fn sync_to_depth(&self, manager: ManagerHandle, depth: SyncDepth);
    fn set_network_reachable(&self, manager: ManagerHandle, reachable: bool);
    fn set_mode(&self, manager: ManagerHandle, mode: SyncMode);
    fn submit(&self, manager: ManagerHandle, wallet: WalletHandle, transfer: TransferHandle);

    fn estimate_limit(
        &self,
        manager: ManagerHandle,
        wallet: WalletHandle,
        as_maximum: bool,
        target: &Address,
        fee: &NetworkFee,
    ) -> Result<EngineLimitEstimate, EngineError>;

    /// Start a fee-basis estimate. The outcome comes back as a
    /// `FeeBasisEstimated` wallet event carrying `cookie`.
    fn estimate_fee_basis(
        &self,
        manager: ManagerHandle,
        wallet: WalletHandle,
        cookie: Cookie,
        target: &Address,
        amount: &Amount,
        fee: &NetworkFee,
    ) -> Result<(), EngineError>;

    /// Complete an outbound query.
    fn announce(
        &self,
        manager: ManagerHandle,
        state: CallbackState,
        result: Result<QueryReply, QueryError>,
    );

    fn release_manager(&self, manager: ManagerHandle);
    fn release_wallet(&self, wallet: WalletHandle);
    fn release_transfer(&self, transfer: TransferHandle);

    fn migrate_required(&self, _network_uids: &str) -> bool {
        false
    }

    fn create_migrator(
        &self,
        _network_uids: &str,
        _path: &Path,
    ) -> Result<Box<dyn StorageMigrator>, MigrateError> {
        Err(MigrateError::Create)
    }
}
