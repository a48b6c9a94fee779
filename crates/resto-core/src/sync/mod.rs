//! Synchronization between the local mirror and the data service.

mod plan;
mod reconciler;
mod trigger;

pub use reconciler::{PassReport, PushFailure, PushOperation, Reconciler};
pub use trigger::{DropReason, NetworkStatus, SyncSignal, SyncTrigger, TriggerOutcome};
