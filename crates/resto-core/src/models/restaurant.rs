//! Restaurant model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::serde_compat::{flexible_bool, timestamp_ms};

/// Server-assigned restaurant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestaurantId(i64);

impl RestaurantId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RestaurantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RestaurantId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Geographic position of a restaurant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A restaurant as mirrored from the data service
///
/// The data service owns every field except `is_favorite`, which is authored
/// locally and pushed upstream on the next sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    #[serde(default)]
    pub cuisine_type: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub address: String,
    /// Image file name stem (no extension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photograph: Option<String>,
    #[serde(default)]
    pub latlng: LatLng,
    /// Day name to opening hours text
    #[serde(default)]
    pub operating_hours: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "flexible_bool::deserialize")]
    pub is_favorite: bool,
    /// Creation timestamp (Unix ms)
    #[serde(rename = "createdAt", with = "timestamp_ms", default)]
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(rename = "updatedAt", with = "timestamp_ms", default)]
    pub updated_at: i64,
}

impl Restaurant {
    /// Flip the favorite flag and stamp the update time.
    pub fn toggle_favorite(&mut self, now_ms: i64) {
        self.is_favorite = !self.is_favorite;
        self.updated_at = now_ms;
    }

    /// Image file name for this restaurant, optionally with a size suffix
    /// (`"-400"` turns `3.jpg` into `3-400.jpg`).
    #[must_use]
    pub fn image_file_name(&self, suffix: Option<&str>) -> String {
        let stem = self
            .photograph
            .as_deref()
            .map(str::trim)
            .filter(|stem| !stem.is_empty())
            .unwrap_or("image-not-found");
        let stem = stem.strip_suffix(".jpg").unwrap_or(stem);
        format!("{stem}{}.jpg", suffix.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "name": "Mission Chinese Food",
        "neighborhood": "Manhattan",
        "photograph": "1",
        "address": "171 E Broadway, New York, NY 10002",
        "latlng": { "lat": 40.713829, "lng": -73.989667 },
        "cuisine_type": "Asian",
        "operating_hours": {
            "Monday": "5:30 pm - 11:00 pm",
            "Tuesday": "5:30 pm - 12:00 am"
        },
        "createdAt": 1504095563444,
        "updatedAt": "2018-06-02T12:00:00.000Z",
        "id": 1,
        "is_favorite": "false"
    }"#;

    #[test]
    fn test_parse_service_payload() {
        let restaurant: Restaurant = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(restaurant.id, RestaurantId::new(1));
        assert_eq!(restaurant.cuisine_type, "Asian");
        assert_eq!(restaurant.operating_hours.len(), 2);
        assert!(!restaurant.is_favorite);
        assert_eq!(restaurant.created_at, 1_504_095_563_444);
        assert_eq!(restaurant.updated_at, 1_527_940_800_000);
    }

    #[test]
    fn test_serialize_normalizes_timestamps() {
        let restaurant: Restaurant = serde_json::from_str(SAMPLE).unwrap();
        let value = serde_json::to_value(&restaurant).unwrap();
        assert_eq!(value["updatedAt"], 1_527_940_800_000_i64);
        assert_eq!(value["is_favorite"], false);

        let reparsed: Restaurant = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, restaurant);
    }

    #[test]
    fn test_toggle_favorite() {
        let mut restaurant: Restaurant = serde_json::from_str(SAMPLE).unwrap();
        restaurant.toggle_favorite(1_600_000_000_000);
        assert!(restaurant.is_favorite);
        assert_eq!(restaurant.updated_at, 1_600_000_000_000);
    }

    #[test]
    fn test_image_file_name() {
        let mut restaurant: Restaurant = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(restaurant.image_file_name(None), "1.jpg");
        assert_eq!(restaurant.image_file_name(Some("-400")), "1-400.jpg");

        restaurant.photograph = None;
        assert_eq!(restaurant.image_file_name(None), "image-not-found.jpg");
    }
}
