//! Review model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::restaurant::RestaurantId;
use super::serde_compat::{flexible_int, timestamp_ms};
use crate::error::{Error, Result};

/// Highest accepted star rating
pub const MAX_RATING: i32 = 5;

/// Review identifier.
///
/// Positive ids are assigned by the data service. Zero and negative ids are
/// temporary ids minted locally for reviews the service has not accepted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(i64);

impl ReviewId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whether this id was minted locally and never acknowledged remotely.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        self.0 < 1
    }
}

impl From<i64> for ReviewId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ReviewId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// A restaurant review, either mirrored from the data service or authored
/// locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    #[serde(deserialize_with = "flexible_int::deserialize")]
    pub restaurant_id: RestaurantId,
    /// Author name
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "flexible_int::deserialize")]
    pub rating: i32,
    #[serde(default)]
    pub comments: String,
    /// Creation timestamp (Unix ms)
    #[serde(rename = "createdAt", with = "timestamp_ms", default)]
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(rename = "updatedAt", with = "timestamp_ms", default)]
    pub updated_at: i64,
}

impl Review {
    /// Create an empty local draft with a temporary id.
    #[must_use]
    pub fn draft(id: ReviewId, restaurant_id: RestaurantId, now_ms: i64) -> Self {
        Self {
            id,
            restaurant_id,
            name: String::new(),
            rating: 0,
            comments: String::new(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Whether the data service has never acknowledged this review.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }

    /// Check the fields the data service requires before saving.
    pub fn validate(&self) -> Result<()> {
        if self.restaurant_id.get() < 1 {
            return Err(Error::Validation(
                "review restaurant id is required".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("review name is required".to_string()));
        }
        if !(0..=MAX_RATING).contains(&self.rating) {
            return Err(Error::Validation(format!(
                "review rating must be between 0 and {MAX_RATING}, got {}",
                self.rating
            )));
        }
        if self.comments.trim().is_empty() {
            return Err(Error::Validation("review comments are required".to_string()));
        }
        Ok(())
    }

    /// Payload for creating this review on the data service.
    #[must_use]
    pub fn create_payload(&self) -> ReviewPayload {
        ReviewPayload {
            restaurant_id: Some(self.restaurant_id),
            ..self.update_payload()
        }
    }

    /// Payload for updating this review on the data service.
    #[must_use]
    pub fn update_payload(&self) -> ReviewPayload {
        ReviewPayload {
            restaurant_id: None,
            name: self.name.clone(),
            rating: self.rating,
            comments: self.comments.clone(),
        }
    }
}

/// Body sent to the data service when creating or updating a review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<RestaurantId>,
    pub name: String,
    pub rating: i32,
    pub comments: String,
}

/// Newest first by `updatedAt`, then by `createdAt`.
pub fn sort_newest_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
