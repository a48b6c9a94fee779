//! Process-wide sync context.
//!
//! Owns the shared store handle, the remote client, the in-flight pass guard
//! and the sync registration counter. Every component takes a clone.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::config::{ClientConfig, RemoteOnlyReviewPolicy};
use crate::remote::{HttpRemote, RemoteService};
use crate::services::{MirrorStore, StoreCell};
use crate::state::SyncState;
use crate::Result;

const EVENT_CAPACITY: usize = 16;

/// Prefix of every sync registration tag
pub const SYNC_TAG_PREFIX: &str = "sync-";

/// Outbound signal: local data changed, views should re-read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataChanged {
    pub restaurants: bool,
    pub reviews: bool,
}

impl DataChanged {
    pub const fn any(self) -> bool {
        self.restaurants || self.reviews
    }
}

struct ContextInner {
    store: StoreCell,
    remote: Arc<dyn RemoteService>,
    remote_only_reviews: RemoteOnlyReviewPolicy,
    events: broadcast::Sender<DataChanged>,
    pass_in_flight: AtomicBool,
    network_active: AtomicBool,
    registrations: AtomicU64,
    owed: Mutex<Option<String>>,
    state: Mutex<SyncState>,
}

/// Shared handle passed to the reconciler, trigger and APIs
#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<ContextInner>,
}

impl SyncContext {
    pub fn new(
        store: StoreCell,
        remote: Arc<dyn RemoteService>,
        remote_only_reviews: RemoteOnlyReviewPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ContextInner {
                store,
                remote,
                remote_only_reviews,
                events,
                pass_in_flight: AtomicBool::new(false),
                network_active: AtomicBool::new(false),
                registrations: AtomicU64::new(0),
                owed: Mutex::new(None),
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// Context backed by the HTTP data service and an on-disk mirror.
    ///
    /// The store opens lazily on first use.
    pub fn from_config(config: &ClientConfig, db_path: impl Into<PathBuf>) -> Result<Self> {
        let remote = HttpRemote::from_config(config)?;
        tracing::debug!("Data service at {}", remote.base_url());
        Ok(Self::new(
            StoreCell::at_path(db_path),
            Arc::new(remote),
            config.remote_only_reviews,
        ))
    }

    /// The local mirror, opening it on first use.
    pub async fn store(&self) -> Result<&MirrorStore> {
        self.inner.store.get().await
    }

    pub fn remote(&self) -> &dyn RemoteService {
        self.inner.remote.as_ref()
    }

    pub fn remote_only_reviews(&self) -> RemoteOnlyReviewPolicy {
        self.inner.remote_only_reviews
    }

    /// Listen for [`DataChanged`] events.
    pub fn subscribe(&self) -> broadcast::Receiver<DataChanged> {
        self.inner.events.subscribe()
    }

    pub(crate) fn notify(&self, change: DataChanged) {
        if change.any() {
            // No subscribers is fine.
            let _ = self.inner.events.send(change);
        }
    }

    /// Whether a reconciliation pass is running.
    pub fn pass_in_flight(&self) -> bool {
        self.inner.pass_in_flight.load(Ordering::Acquire)
    }

    /// Take the single pass slot; `None` when a pass is already running.
    pub(crate) fn try_begin_pass(&self) -> Option<PassGuard> {
        self.inner
            .pass_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Record that a sync is owed and return its tag.
    ///
    /// While a sync is already owed the same tag comes back, so repeated
    /// edits share one registration.
    pub fn register_sync(&self) -> String {
        let mut owed = lock(&self.inner.owed);
        if let Some(tag) = owed.as_ref() {
            return tag.clone();
        }
        let next = self.inner.registrations.fetch_add(1, Ordering::AcqRel) + 1;
        let tag = format!("{SYNC_TAG_PREFIX}{next}");
        tracing::debug!("Registered sync {tag}");
        *owed = Some(tag.clone());
        tag
    }

    /// Tag of the sync currently owed, if any.
    pub fn pending_sync(&self) -> Option<String> {
        lock(&self.inner.owed).clone()
    }

    /// Move the owed registration into a starting pass.
    ///
    /// Edits made while the pass runs register a fresh tag.
    pub(crate) fn claim_registration(&self) -> Option<String> {
        lock(&self.inner.owed).take()
    }

    /// Put back a registration claimed by a pass that failed.
    pub(crate) fn restore_registration(&self, tag: String) {
        let mut owed = lock(&self.inner.owed);
        if owed.is_none() {
            *owed = Some(tag);
        }
    }

    pub fn state(&self) -> SyncState {
        *lock(&self.inner.state)
    }

    pub(crate) fn set_state(&self, state: SyncState) {
        let mut current = lock(&self.inner.state);
        if *current != state {
            tracing::debug!("Sync state {current} -> {state}");
            *current = state;
        }
    }

    /// Record the latest network activity; returns the previous value.
    pub(crate) fn swap_network_active(&self, active: bool) -> bool {
        self.inner.network_active.swap(active, Ordering::AcqRel)
    }
}

/// Holds the pass slot until dropped
pub(crate) struct PassGuard {
    inner: Arc<ContextInner>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.inner.pass_in_flight.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;
    use pretty_assertions::assert_eq;

    fn context() -> SyncContext {
        SyncContext::new(
            StoreCell::in_memory(),
            Arc::new(InMemoryRemote::new()),
            RemoteOnlyReviewPolicy::default(),
        )
    }

    #[test]
    fn pass_guard_is_exclusive() {
        let context = context();
        let guard = context.try_begin_pass().unwrap();
        assert!(context.pass_in_flight());
        assert!(context.try_begin_pass().is_none());

        drop(guard);
        assert!(!context.pass_in_flight());
        assert!(context.try_begin_pass().is_some());
    }

    #[test]
    fn registration_is_idempotent_while_owed() {
        let context = context();
        assert_eq!(context.register_sync(), "sync-1");
        assert_eq!(context.register_sync(), "sync-1");

        let claimed = context.claim_registration().unwrap();
        assert_eq!(context.pending_sync(), None);
        assert_eq!(context.register_sync(), "sync-2");

        context.restore_registration(claimed);
        assert_eq!(context.pending_sync().as_deref(), Some("sync-2"));
    }

    #[test]
    fn restore_refills_empty_registration() {
        let context = context();
        context.register_sync();
        let claimed = context.claim_registration().unwrap();
        context.restore_registration(claimed);
        assert_eq!(context.pending_sync().as_deref(), Some("sync-1"));
    }

    #[tokio::test]
    async fn notify_skips_empty_changes() {
        let context = context();
        let mut events = context.subscribe();

        context.notify(DataChanged::default());
        context.notify(DataChanged {
            restaurants: false,
            reviews: true,
        });

        let received = events.recv().await.unwrap();
        assert!(received.reviews);
        assert!(events.try_recv().is_err());
    }
}
