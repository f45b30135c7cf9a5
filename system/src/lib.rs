//! Wallet-system synchronization core.
//!
//! A [`System`] tracks a set of blockchain networks and the wallet managers,
//! wallets and transfers built on them. It:
//! - Discovers networks by merging builtin definitions with the query service
//! - Turns sync-engine callbacks into ordered, per-entity application events
//! - Forwards engine queries to the query service and announces the replies
//! - Estimates spendable limits when the fee is paid in the spent currency

pub mod account;
pub mod builtins;
pub mod callback_coordinator;
pub mod config;
pub mod discovery;
mod dispatch;
pub mod engine;
pub mod error;
pub mod estimation;
pub mod events;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod network;
mod query;
pub mod registry;
pub mod system;
pub mod tracing_spans;
pub mod transfer;
pub mod transfer_merge;
pub mod wallet;
pub mod wallet_manager;

pub use account::Account;
pub use callback_coordinator::{CallbackCoordinator, FeeHandler, LimitHandler};
pub use config::SystemConfig;
pub use discovery::NetworkDiscovery;
pub use engine::{
    BlockBlob, CallbackState, EngineClient, EngineContext, EngineError, EngineLimitEstimate,
    EngineListener, EngineManagerEvent, EngineTransferEvent, EngineWalletEvent, ManagerSpec,
    MigrateError, PeerBlob, QueryReply, QueryRequest, StorageMigrator, SyncEngine,
    TransactionBlob, TransactionBundle, TransactionStatus, TransferBundle, TransferRecord,
};
pub use error::SystemError;
pub use events::{
    NetworkEvent, SystemEvent, SystemListener, TransferEvent, WalletEvent, WalletManagerEvent,
};
pub use executor::{Executor, Job, SerialExecutor};
pub use logging::{init_logging, LogFormat};
pub use metrics::SystemMetrics;
pub use network::{Network, NetworkAssociation, NetworkSpec};
pub use registry::active_tokens;
pub use system::{FeeUpdateHandler, System, SystemContext};
pub use transfer::Transfer;
pub use wallet::Wallet;
pub use wallet_manager::WalletManager;
