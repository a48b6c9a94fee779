//! Query and edit surface for hosts.
//!
//! Reads always come from the local mirror. Edits land in the mirror first
//! and register a sync so the next pass pushes them.

mod edit;
mod read;

pub use edit::EditApi;
pub use read::{filter_restaurants, ReadApi, RestaurantDetail, ALL_FILTER};
