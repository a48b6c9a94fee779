//! resto-core - Offline-first sync core for Resto
//!
//! This crate contains the models, the local mirror store, the data service
//! client and the reconciliation logic shared by every Resto host.

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use api::{EditApi, ReadApi, RestaurantDetail};
pub use config::{ClientConfig, RemoteOnlyReviewPolicy};
pub use context::{DataChanged, SyncContext};
pub use error::{Error, Result};
pub use models::{Collection, Restaurant, RestaurantId, Review, ReviewId};
pub use state::SyncState;
pub use sync::{PassReport, Reconciler, SyncSignal, SyncTrigger, TriggerOutcome};
