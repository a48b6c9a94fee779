//! Data models for Resto

mod conflict;
mod restaurant;
mod review;
mod serde_compat;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use conflict::{SyncConflict, Winner};
pub use restaurant::{LatLng, Restaurant, RestaurantId};
pub use review::{sort_newest_first, Review, ReviewId, ReviewPayload, MAX_RATING};

/// The two mirrored collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Restaurants,
    Reviews,
}

impl Collection {
    /// Table name in the local store, also the data service path segment.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::Reviews => "reviews",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "restaurants" => Some(Self::Restaurants),
            "reviews" => Some(Self::Reviews),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
