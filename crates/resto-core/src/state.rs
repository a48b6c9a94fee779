//! Sync state reported to hosts.

use std::fmt;

/// Where the sync trigger currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No active network seen yet, or the network dropped
    #[default]
    Offline,
    /// A reconciliation pass is running
    Syncing,
    /// The last pass completed
    Synced,
    /// The last pass failed
    Error,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
