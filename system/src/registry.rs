//! Process-wide table of live systems.
//!
//! Engine callbacks carry only a [`SystemToken`]; this table maps it back to
//! the owning [`System`]. A lookup after removal returns `None` and the
//! caller drops the callback.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use walletkit_types::SystemToken;

use crate::system::System;

static SYSTEMS: LazyLock<DashMap<SystemToken, Arc<System>>> = LazyLock::new(DashMap::new);

/// Removed systems kept alive while engine resources may still refer to them.
static GRAVEYARD: LazyLock<Mutex<Vec<Arc<System>>>> = LazyLock::new(|| Mutex::new(Vec::new()));

static NEXT_TOKEN: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_token() -> SystemToken {
    SystemToken::new(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn insert(system: Arc<System>) {
    SYSTEMS.insert(system.token(), system);
}

pub(crate) fn lookup(token: SystemToken) -> Option<Arc<System>> {
    SYSTEMS.get(&token).map(|entry| Arc::clone(entry.value()))
}

/// Like [`lookup`], but also finds retained systems.
pub(crate) fn lookup_retained(token: SystemToken) -> Option<Arc<System>> {
    lookup(token).or_else(|| {
        GRAVEYARD
            .lock()
            .iter()
            .find(|s| s.token() == token)
            .cloned()
    })
}

/// Remove a system, optionally retaining it in the graveyard.
pub(crate) fn remove(token: SystemToken, retain: bool) -> Option<Arc<System>> {
    let (_, system) = SYSTEMS.remove(&token)?;
    if retain {
        GRAVEYARD.lock().push(Arc::clone(&system));
    }
    Some(system)
}

/// Tokens of every live system.
pub fn active_tokens() -> Vec<SystemToken> {
    SYSTEMS.iter().map(|entry| *entry.key()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = next_token();
        let b = next_token();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_token_is_absent() {
        assert!(lookup(SystemToken::new(u32::MAX)).is_none());
        assert!(lookup_retained(SystemToken::new(u32::MAX)).is_none());
    }
}
