//! Pre-built [`tracing::Span`] constructors for system operations.
//!
//! Consistent span names and fields make it easy to correlate one
//! system's discovery, dispatch and query traffic in a shared log.

use tracing::{debug_span, info_span, Span};
use walletkit_types::SystemToken;

/// Span covering one network discovery pass.
pub fn discovery_span(token: SystemToken, is_mainnet: bool) -> Span {
    info_span!("discovery", system = %token, mainnet = is_mainnet)
}

/// Span covering the currency fetch and network build for one blockchain.
pub fn blockchain_span(blockchain_id: &str) -> Span {
    debug_span!("blockchain", id = %blockchain_id)
}

/// Span covering the handling of one engine lifecycle event.
pub fn dispatch_span(token: SystemToken, kind: &'static str) -> Span {
    debug_span!("dispatch", system = %token, kind)
}

/// Span covering one outbound engine query.
pub fn query_span(token: SystemToken, request: &'static str) -> Span {
    debug_span!("query", system = %token, request)
}

/// Span covering a limit or fee estimation for a wallet.
pub fn estimation_span(wallet: &str, as_maximum: bool) -> Span {
    info_span!("estimate_limit", wallet = %wallet, maximum = as_maximum)
}
