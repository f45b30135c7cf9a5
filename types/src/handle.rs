//! Opaque identifiers exchanged with the sync engine.
//!
//! Handles are plain integers owned by the engine. The core never interprets
//! them; it only uses them as keys to re-resolve its own entity records.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name($inner);

        impl $name {
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            pub const fn raw(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

opaque_id!(
    /// Engine handle of a wallet manager.
    ManagerHandle(u64),
    "manager"
);
opaque_id!(
    /// Engine handle of a wallet.
    WalletHandle(u64),
    "wallet"
);
opaque_id!(
    /// Engine handle of a transfer.
    TransferHandle(u64),
    "transfer"
);
opaque_id!(
    /// Process-unique identity of a live system.
    SystemToken(u32),
    "system"
);
opaque_id!(
    /// Correlates an asynchronous engine reply with a pending handler.
    Cookie(u64),
    "cookie"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind() {
        assert_eq!(WalletHandle::new(7).to_string(), "wallet#7");
        assert_eq!(SystemToken::new(1).to_string(), "system#1");
        assert_eq!(Cookie::new(42).raw(), 42);
    }
}
