//! Shared services
//!
//! Async access to the local mirror for the sync and read layers.

mod mirror;

pub use mirror::{MirrorStore, StoreCell};
