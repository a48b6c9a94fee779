//! Edge-triggered scheduling of reconciliation passes.
//!
//! Two host signals can start a pass: the network becoming active and a
//! background wake-up carrying a sync tag. A signal that arrives while a pass
//! is running is dropped, not queued.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::reconciler::{PassReport, Reconciler};
use crate::context::{SyncContext, SYNC_TAG_PREFIX};
use crate::state::SyncState;
use crate::Error;

/// Connectivity as reported by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStatus {
    /// Connection type such as `4g` or `wifi`; `None` when unknown
    pub effective_type: Option<String>,
    /// Estimated downlink in Mbit/s
    pub downlink: f64,
}

impl NetworkStatus {
    pub fn new(effective_type: impl Into<String>, downlink: f64) -> Self {
        Self {
            effective_type: Some(effective_type.into()),
            downlink,
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    /// Known connection type and a positive downlink.
    pub fn is_active(&self) -> bool {
        self.effective_type
            .as_deref()
            .is_some_and(|kind| !kind.trim().is_empty())
            && self.downlink > 0.0
    }
}

/// Inbound signal from the host environment
#[derive(Debug, Clone, PartialEq)]
pub enum SyncSignal {
    NetworkChanged(NetworkStatus),
    BackgroundWake { tag: String },
}

/// Why a signal did not start a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NetworkInactive,
    /// The network was already active
    NotAnEdge,
    /// Wake-up tag not minted by [`SyncContext::register_sync`]
    UnknownTag,
    PassInFlight,
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(PassReport),
    Failed(Error),
    Dropped(DropReason),
}

/// Turns host signals into reconciliation passes
#[derive(Clone)]
pub struct SyncTrigger {
    reconciler: Reconciler,
}

impl SyncTrigger {
    pub const fn new(context: SyncContext) -> Self {
        Self {
            reconciler: Reconciler::new(context),
        }
    }

    pub const fn context(&self) -> &SyncContext {
        self.reconciler.context()
    }

    pub fn state(&self) -> SyncState {
        self.context().state()
    }

    /// Handle one signal, running a pass when it qualifies.
    pub async fn fire(&self, signal: SyncSignal) -> TriggerOutcome {
        let context = self.context();
        match signal {
            SyncSignal::NetworkChanged(status) => {
                let active = status.is_active();
                let was_active = context.swap_network_active(active);
                if !active {
                    if !context.pass_in_flight() {
                        context.set_state(SyncState::Offline);
                    }
                    return TriggerOutcome::Dropped(DropReason::NetworkInactive);
                }
                if was_active {
                    return TriggerOutcome::Dropped(DropReason::NotAnEdge);
                }
                tracing::info!(
                    "Network became active ({}), syncing",
                    status.effective_type.as_deref().unwrap_or("unknown")
                );
            }
            SyncSignal::BackgroundWake { tag } => {
                if !tag.starts_with(SYNC_TAG_PREFIX) {
                    tracing::debug!("Ignoring background wake with tag {tag:?}");
                    return TriggerOutcome::Dropped(DropReason::UnknownTag);
                }
                tracing::debug!("Background wake {tag}");
            }
        }

        match self.reconciler.run_pass().await {
            Ok(report) => TriggerOutcome::Completed(report),
            Err(Error::SyncInProgress) => TriggerOutcome::Dropped(DropReason::PassInFlight),
            Err(error) => TriggerOutcome::Failed(error),
        }
    }

    /// Handle signals from `signals` until the sender side closes.
    ///
    /// Each signal runs in its own task so one that arrives mid-pass is
    /// dropped instead of waiting behind it.
    pub fn spawn_listener(&self, mut signals: mpsc::Receiver<SyncSignal>) -> JoinHandle<()> {
        let trigger = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let trigger = trigger.clone();
                tokio::spawn(async move {
                    log_outcome(&trigger.fire(signal).await);
                });
            }
            tracing::debug!("Sync signal channel closed");
        })
    }

    /// Deliver a background wake-up every `interval`, starting now.
    pub fn spawn_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let trigger = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let tag = trigger.context().register_sync();
                log_outcome(&trigger.fire(SyncSignal::BackgroundWake { tag }).await);
            }
        })
    }
}

fn log_outcome(outcome: &TriggerOutcome) {
    match outcome {
        TriggerOutcome::Completed(report) => {
            tracing::debug!("Triggered pass pushed {} changes", report.pushed());
        }
        TriggerOutcome::Failed(error) => tracing::warn!("Triggered sync failed: {error}"),
        TriggerOutcome::Dropped(reason) => tracing::debug!("Sync signal dropped: {reason:?}"),
    }
}
