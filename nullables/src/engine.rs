//! Nullable sync engine: record calls, emit lifecycle events on demand.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use walletkit_blockchaindb::QueryError;
use walletkit_system::{
    BlockBlob, CallbackState, EngineContext, EngineError, EngineLimitEstimate, EngineManagerEvent,
    EngineTransferEvent, EngineWalletEvent, ManagerSpec, MigrateError, PeerBlob, QueryReply,
    QueryRequest, StorageMigrator, SyncEngine, TransactionBlob, TransferRecord,
};
use walletkit_types::{
    Address, AddressScheme, Amount, Cookie, Currency, FeeEstimationError, ManagerHandle,
    NetworkFee, SyncDepth, SyncMode, TransferFeeBasis, TransferHandle, WalletHandle,
};

/// One call the core made into the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    CreateManager {
        network_uids: String,
        mode: SyncMode,
        scheme: AddressScheme,
    },
    RegisterWallet {
        manager: ManagerHandle,
        currency_uids: String,
    },
    Connect(ManagerHandle),
    Disconnect(ManagerHandle),
    Stop(ManagerHandle),
    Sync(ManagerHandle),
    SyncToDepth(ManagerHandle, SyncDepth),
    SetNetworkReachable(ManagerHandle, bool),
    SetMode(ManagerHandle, SyncMode),
    Submit(ManagerHandle, WalletHandle, TransferHandle),
    EstimateLimit {
        wallet: WalletHandle,
        as_maximum: bool,
    },
    EstimateFeeBasis {
        wallet: WalletHandle,
        cookie: Cookie,
        amount: Amount,
    },
    Announce {
        manager: ManagerHandle,
        state: u64,
        result: Result<QueryReply, QueryError>,
    },
    ReleaseManager(ManagerHandle),
    ReleaseWallet(WalletHandle),
    ReleaseTransfer(TransferHandle),
    Migrate(String),
}

/// A sync engine that never syncs.
///
/// Manager creation and wallet registration report back through the
/// engine context exactly as a real engine would, so the system sees the
/// same event sequence. Limit and fee estimates answer from scripts.
pub struct NullSyncEngine {
    next_handle: AtomicU64,
    fail_create: AtomicBool,
    contexts: Mutex<HashMap<ManagerHandle, EngineContext>>,
    wallets: Mutex<HashMap<WalletHandle, ManagerHandle>>,
    calls: Mutex<Vec<EngineCall>>,
    limit: Mutex<Option<EngineLimitEstimate>>,
    fee_replies: Mutex<VecDeque<Result<TransferFeeBasis, FeeEstimationError>>>,
    fallback_fee: Mutex<Option<TransferFeeBasis>>,
    migrate_networks: Mutex<HashSet<String>>,
    migrated: Arc<Mutex<Vec<String>>>,
}

impl NullSyncEngine {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            fail_create: AtomicBool::new(false),
            contexts: Mutex::new(HashMap::new()),
            wallets: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            limit: Mutex::new(None),
            fee_replies: Mutex::new(VecDeque::new()),
            fallback_fee: Mutex::new(None),
            migrate_networks: Mutex::new(HashSet::new()),
            migrated: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    // ── Scripting ───────────────────────────────────────────────────────

    /// Make the next `create_manager` calls fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::Release);
    }

    /// First-pass reply of `estimate_limit`. Unscripted calls fail.
    pub fn set_limit(&self, estimate: EngineLimitEstimate) {
        *self.limit.lock() = Some(estimate);
    }

    /// Queue fee-basis replies, consumed one per estimate.
    pub fn push_fee_replies(&self, replies: impl IntoIterator<Item = Result<TransferFeeBasis, FeeEstimationError>>) {
        self.fee_replies.lock().extend(replies);
    }

    /// Reply used once the queued replies run out.
    pub fn set_fallback_fee(&self, basis: TransferFeeBasis) {
        *self.fallback_fee.lock() = Some(basis);
    }

    pub fn require_migration(&self, network_uids: &str) {
        self.migrate_networks.lock().insert(network_uids.to_string());
    }

    // ── Inspection ──────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Records written by migrators, as `kind:detail` strings.
    pub fn migrated(&self) -> Vec<String> {
        self.migrated.lock().clone()
    }

    /// Wait until `predicate` holds for some recorded call.
    pub fn wait_for_call(&self, timeout: Duration, predicate: impl Fn(&EngineCall) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.calls.lock().iter().any(&predicate) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    // ── Emitting ────────────────────────────────────────────────────────

    /// The context handed to `create_manager`, for emitting events by hand.
    pub fn context(&self, manager: ManagerHandle) -> Option<EngineContext> {
        self.contexts.lock().get(&manager).cloned()
    }

    pub fn emit_manager_event(&self, manager: ManagerHandle, event: EngineManagerEvent) {
        if let Some(context) = self.context(manager) {
            context.listener.manager_event(manager, event);
        }
    }

    pub fn emit_wallet_event(&self, manager: ManagerHandle, wallet: WalletHandle, event: EngineWalletEvent) {
        if let Some(context) = self.context(manager) {
            context.listener.wallet_event(manager, wallet, event);
        }
    }

    /// Create a transfer in `wallet` and return its handle.
    pub fn emit_transfer(&self, manager: ManagerHandle, wallet: WalletHandle, record: TransferRecord) -> TransferHandle {
        let transfer = TransferHandle::new(self.next_raw());
        if let Some(context) = self.context(manager) {
            context
                .listener
                .transfer_event(manager, wallet, transfer, EngineTransferEvent::Created(record));
            context
                .listener
                .wallet_event(manager, wallet, EngineWalletEvent::TransferAdded(transfer));
        }
        transfer
    }

    pub fn emit_transfer_event(
        &self,
        manager: ManagerHandle,
        wallet: WalletHandle,
        transfer: TransferHandle,
        event: EngineTransferEvent,
    ) {
        if let Some(context) = self.context(manager) {
            context.listener.transfer_event(manager, wallet, transfer, event);
        }
    }

    /// Issue an outbound query as the engine would.
    pub fn request(&self, manager: ManagerHandle, state: u64, request: QueryRequest) {
        if let Some(context) = self.context(manager) {
            context.client.request(manager, CallbackState::new(state), request);
        }
    }
}

impl Default for NullSyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine for NullSyncEngine {
    fn create_manager(&self, spec: &ManagerSpec, context: EngineContext) -> Result<ManagerHandle, EngineError> {
        self.record(EngineCall::CreateManager {
            network_uids: spec.network_uids.clone(),
            mode: spec.mode,
            scheme: spec.scheme,
        });
        if self.fail_create.load(Ordering::Acquire) {
            return Err(EngineError::CreateFailed(spec.network_uids.clone()));
        }
        let manager = ManagerHandle::new(self.next_raw());
        context.listener.manager_event(manager, EngineManagerEvent::Created);
        self.contexts.lock().insert(manager, context);
        debug!(%manager, network = %spec.network_uids, "null engine: manager created");
        Ok(manager)
    }

    fn register_wallet(&self, manager: ManagerHandle, currency: &Currency) -> Option<WalletHandle> {
        self.record(EngineCall::RegisterWallet {
            manager,
            currency_uids: currency.uids().to_string(),
        });
        let context = self.context(manager)?;
        let wallet = WalletHandle::new(self.next_raw());
        self.wallets.lock().insert(wallet, manager);
        context.listener.wallet_event(
            manager,
            wallet,
            EngineWalletEvent::Created {
                currency_uids: currency.uids().to_string(),
            },
        );
        context
            .listener
            .manager_event(manager, EngineManagerEvent::WalletAdded(wallet));
        Some(wallet)
    }

    fn connect(&self, manager: ManagerHandle) {
        self.record(EngineCall::Connect(manager));
    }

    fn disconnect(&self, manager: ManagerHandle) {
        self.record(EngineCall::Disconnect(manager));
    }

    fn stop(&self, manager: ManagerHandle) {
        self.record(EngineCall::Stop(manager));
    }

    fn sync(&self, manager: ManagerHandle) {
        self.record(EngineCall::Sync(manager));
    }

    fn sync_to_depth(&self, manager: ManagerHandle, depth: SyncDepth) {
        self.record(EngineCall::SyncToDepth(manager, depth));
    }

    fn set_network_reachable(&self, manager: ManagerHandle, reachable: bool) {
        self.record(EngineCall::SetNetworkReachable(manager, reachable));
    }

    fn set_mode(&self, manager: ManagerHandle, mode: SyncMode) {
        self.record(EngineCall::SetMode(manager, mode));
    }

    fn submit(&self, manager: ManagerHandle, wallet: WalletHandle, transfer: TransferHandle) {
        self.record(EngineCall::Submit(manager, wallet, transfer));
    }

    fn estimate_limit(
        &self,
        _manager: ManagerHandle,
        wallet: WalletHandle,
        as_maximum: bool,
        _target: &Address,
        _fee: &NetworkFee,
    ) -> Result<EngineLimitEstimate, EngineError> {
        self.record(EngineCall::EstimateLimit { wallet, as_maximum });
        self.limit
            .lock()
            .clone()
            .ok_or_else(|| EngineError::Other("no limit scripted".to_string()))
    }

    fn estimate_fee_basis(
        &self,
        manager: ManagerHandle,
        wallet: WalletHandle,
        cookie: Cookie,
        _target: &Address,
        amount: &Amount,
        _fee: &NetworkFee,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::EstimateFeeBasis {
            wallet,
            cookie,
            amount: amount.clone(),
        });
        let reply = self.fee_replies.lock().pop_front();
        let result = match reply {
            Some(result) => result,
            None => self
                .fallback_fee
                .lock()
                .clone()
                .ok_or(FeeEstimationError::ServiceUnavailable),
        };
        let context = self
            .context(manager)
            .ok_or_else(|| EngineError::UnknownHandle(manager.to_string()))?;
        context
            .listener
            .wallet_event(manager, wallet, EngineWalletEvent::FeeBasisEstimated { cookie, result });
        Ok(())
    }

    fn announce(&self, manager: ManagerHandle, state: CallbackState, result: Result<QueryReply, QueryError>) {
        self.record(EngineCall::Announce {
            manager,
            state: state.raw(),
            result,
        });
    }

    fn release_manager(&self, manager: ManagerHandle) {
        self.contexts.lock().remove(&manager);
        self.record(EngineCall::ReleaseManager(manager));
    }

    fn release_wallet(&self, wallet: WalletHandle) {
        self.wallets.lock().remove(&wallet);
        self.record(EngineCall::ReleaseWallet(wallet));
    }

    fn release_transfer(&self, transfer: TransferHandle) {
        self.record(EngineCall::ReleaseTransfer(transfer));
    }

    fn migrate_required(&self, network_uids: &str) -> bool {
        self.migrate_networks.lock().contains(network_uids)
    }

    fn create_migrator(&self, network_uids: &str, _path: &Path) -> Result<Box<dyn StorageMigrator>, MigrateError> {
        if !self.migrate_required(network_uids) {
            return Err(MigrateError::Create);
        }
        self.record(EngineCall::Migrate(network_uids.to_string()));
        Ok(Box::new(NullMigrator {
            written: Arc::clone(&self.migrated),
        }))
    }
}

/// Records blobs; an empty blob is malformed.
struct NullMigrator {
    written: Arc<Mutex<Vec<String>>>,
}

impl StorageMigrator for NullMigrator {
    fn put_transaction(&mut self, blob: &TransactionBlob) -> Result<(), MigrateError> {
        if blob.bytes.is_empty() {
            return Err(MigrateError::Transaction);
        }
        self.written.lock().push(format!("transaction:{}", blob.block_height));
        Ok(())
    }

    fn put_block(&mut self, blob: &BlockBlob) -> Result<(), MigrateError> {
        if blob.bytes.is_empty() {
            return Err(MigrateError::Block);
        }
        self.written.lock().push(format!("block:{}", blob.height));
        Ok(())
    }

    fn put_peer(&mut self, blob: &PeerBlob) -> Result<(), MigrateError> {
        if blob.port == 0 {
            return Err(MigrateError::Peer);
        }
        self.written.lock().push(format!("peer:{}", blob.port));
        Ok(())
    }
}
