//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::Collection;

/// Side whose copy survived a last-writer-wins comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Local,
    Remote,
}

impl Winner {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Recorded sync conflict resolved by last-writer-wins on `updatedAt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Collection of the record involved
    pub collection: Collection,
    /// Record involved in the conflict
    pub record_id: i64,
    /// Local copy's timestamp when the conflict was seen
    pub local_updated_at: i64,
    /// Remote copy's timestamp when the conflict was seen
    pub remote_updated_at: i64,
    /// Which copy won
    pub winner: Winner,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
}
