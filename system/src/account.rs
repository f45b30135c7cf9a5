//! The account a system is created for.

use serde::{Deserialize, Serialize};

/// Identity of the user account behind a system.
///
/// Key material lives in the engine; the core only needs a stable identifier
/// and a filesystem-safe name for the account's storage directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    uids: String,
    filesystem_id: String,
    /// Creation time, seconds since the Unix epoch.
    timestamp: u64,
}

impl Account {
    pub fn new(uids: impl Into<String>, filesystem_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            uids: uids.into(),
            filesystem_id: filesystem_id.into(),
            timestamp,
        }
    }

    /// Derive the filesystem identifier from the uids.
    pub fn from_uids(uids: impl Into<String>, timestamp: u64) -> Self {
        let uids = uids.into();
        let filesystem_id = hex::encode(uids.as_bytes());
        Self {
            uids,
            filesystem_id,
            timestamp,
        }
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn filesystem_id(&self) -> &str {
        &self.filesystem_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}
