//! Reconciliation passes between the local mirror and the data service.
//!
//! A pass fetches both remote collections, plans against one consistent
//! local snapshot, runs the pushes concurrently and applies every local
//! change in a single transaction. A failed fetch aborts the pass before the
//! store is touched.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use futures::future::join_all;

use super::plan::{plan_pass, Guarded, Snapshot, SyncPlan};
use crate::context::{DataChanged, SyncContext};
use crate::db::{CollectionStore, Record};
use crate::models::{Collection, Restaurant, Review, ReviewId, ReviewPayload};
use crate::state::SyncState;
use crate::util::now_ms;
use crate::{Error, Result};

/// Kind of write sent to the data service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOperation {
    Favorite,
    CreateReview,
    UpdateReview,
    DeleteReview,
}

impl PushOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::CreateReview => "create review",
            Self::UpdateReview => "update review",
            Self::DeleteReview => "delete review",
        }
    }
}

impl fmt::Display for PushOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A push that failed; the pass itself still completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFailure {
    pub operation: PushOperation,
    pub id: i64,
    pub message: String,
}

/// Summary of one completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Restaurants written from the remote copy
    pub restaurants_pulled: usize,
    /// Reviews written from the remote copy
    pub reviews_pulled: usize,
    /// Confirmed reviews removed because the service no longer has them
    pub reviews_removed: usize,
    pub favorites_pushed: usize,
    pub reviews_created: usize,
    pub reviews_updated: usize,
    pub reviews_deleted: usize,
    /// Temporary reviews purged after a failed create
    pub temporary_purged: usize,
    pub conflicts: usize,
    /// Local writes skipped because the record changed during the pass
    pub stale_skipped: usize,
    pub push_failures: Vec<PushFailure>,
    pub changed: DataChanged,
}

impl PassReport {
    /// Successful pushes of any kind.
    pub const fn pushed(&self) -> usize {
        self.favorites_pushed + self.reviews_created + self.reviews_updated + self.reviews_deleted
    }

    /// Whether the pass neither pushed nor changed local data.
    pub fn is_noop(&self) -> bool {
        self.pushed() == 0 && self.push_failures.is_empty() && !self.changed.any()
    }
}

struct PushOutcomes {
    favorites: Vec<Result<Restaurant>>,
    updates: Vec<Result<Review>>,
    creates: Vec<Result<Review>>,
    deletes: Vec<Result<()>>,
}

/// Runs reconciliation passes for one [`SyncContext`]
#[derive(Clone)]
pub struct Reconciler {
    context: SyncContext,
}

impl Reconciler {
    pub const fn new(context: SyncContext) -> Self {
        Self { context }
    }

    pub const fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Run one pass.
    ///
    /// Returns [`Error::SyncInProgress`] without doing anything when another
    /// pass holds the slot.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let Some(_guard) = self.context.try_begin_pass() else {
            tracing::debug!("Sync pass already in flight");
            return Err(Error::SyncInProgress);
        };

        let claimed = self.context.claim_registration();
        self.context.set_state(SyncState::Syncing);

        let result = self.reconcile().await;
        match &result {
            Ok(report) => {
                self.context.set_state(SyncState::Synced);
                if !report.push_failures.is_empty() {
                    if let Some(tag) = claimed {
                        self.context.restore_registration(tag);
                    }
                }
            }
            Err(error) => {
                tracing::warn!("Sync pass failed: {error}");
                self.context.set_state(SyncState::Error);
                if let Some(tag) = claimed {
                    self.context.restore_registration(tag);
                }
            }
        }
        result
    }

    async fn reconcile(&self) -> Result<PassReport> {
        let store = self.context.store().await?;
        let remote = self.context.remote();

        let (remote_restaurants, remote_reviews) =
            futures::try_join!(remote.fetch_restaurants(), remote.fetch_reviews())?;
        let remote_snapshot = Snapshot {
            restaurants: remote_restaurants,
            reviews: remote_reviews,
            ..Snapshot::default()
        };

        let local_snapshot = store
            .transaction(|tx| {
                Ok(Snapshot {
                    restaurants: tx.get_all()?,
                    reviews: tx.get_all()?,
                    synced_reviews: tx
                        .synced_review_ids()?
                        .into_iter()
                        .map(ReviewId::new)
                        .collect::<BTreeSet<_>>(),
                })
            })
            .await?;

        let plan = plan_pass(
            &local_snapshot,
            &remote_snapshot,
            self.context.remote_only_reviews(),
            now_ms(),
        );
        tracing::debug!(
            "Sync plan: {} restaurant writes, {} review writes, {} removals, {} pushes",
            plan.restaurant_writes.len(),
            plan.review_writes.len(),
            plan.review_removals.len(),
            plan.push_count()
        );

        let outcomes = self.push(&plan).await;
        let report = store.transaction(|tx| apply(tx, &plan, outcomes)).await?;

        tracing::info!(
            "Sync pass complete: pulled {} restaurants and {} reviews, pushed {}, removed {}, purged {}, {} failed pushes",
            report.restaurants_pulled,
            report.reviews_pulled,
            report.pushed(),
            report.reviews_removed,
            report.temporary_purged,
            report.push_failures.len()
        );
        self.context.notify(report.changed);
        Ok(report)
    }

    async fn push(&self, plan: &SyncPlan) -> PushOutcomes {
        let remote = self.context.remote();

        let favorites = join_all(
            plan.favorite_pushes
                .iter()
                .map(|push| remote.update_restaurant_favorite(push.id, push.is_favorite)),
        );
        let updates = join_all(
            plan.review_updates
                .iter()
                .map(|update| remote.update_review(update.id, &update.payload)),
        );
        let creates = join_all(
            plan.review_creates
                .iter()
                .map(|create| remote.create_review(&create.payload)),
        );
        let deletes = join_all(plan.review_deletes.iter().map(|id| remote.delete_review(*id)));

        let (favorites, updates, creates, deletes) =
            futures::join!(favorites, updates, creates, deletes);
        PushOutcomes {
            favorites,
            updates,
            creates,
            deletes,
        }
    }
}

/// Write `record` only if the stored `updatedAt` still equals `expected`.
fn guarded_put<R: Record>(
    tx: &CollectionStore<'_>,
    record: &R,
    expected: Option<i64>,
) -> Result<bool> {
    if tx.updated_at_of(R::COLLECTION, record.key())? != expected {
        tracing::debug!(
            "Skipping stale write to {} {}",
            R::COLLECTION,
            record.key()
        );
        return Ok(false);
    }
    tx.put(record)?;
    Ok(true)
}

fn guarded_delete(tx: &CollectionStore<'_>, removal: &Guarded<ReviewId>) -> Result<bool> {
    let id = removal.record.get();
    if tx.updated_at_of(Collection::Reviews, id)? != removal.expected {
        return Ok(false);
    }
    tx.delete(Collection::Reviews, id)
}

/// Whether a push response carries the pushed review fields.
fn echoes_payload(server_copy: &Review, payload: &ReviewPayload) -> bool {
    server_copy.name == payload.name
        && server_copy.rating == payload.rating
        && server_copy.comments == payload.comments
}

fn apply(tx: &CollectionStore<'_>, plan: &SyncPlan, outcomes: PushOutcomes) -> Result<PassReport> {
    let mut report = PassReport::default();

    for write in &plan.restaurant_writes {
        if guarded_put(tx, &write.record, write.expected)? {
            report.restaurants_pulled += 1;
            report.changed.restaurants = true;
        } else {
            report.stale_skipped += 1;
        }
    }

    for write in &plan.review_writes {
        if guarded_put(tx, &write.record, write.expected)? {
            report.reviews_pulled += 1;
            report.changed.reviews = true;
        } else {
            report.stale_skipped += 1;
        }
    }

    for removal in &plan.review_removals {
        if guarded_delete(tx, removal)? {
            tx.forget_synced_review(removal.record.get())?;
            report.reviews_removed += 1;
            report.changed.reviews = true;
        } else {
            report.stale_skipped += 1;
        }
    }

    for (push, outcome) in plan.favorite_pushes.iter().zip(outcomes.favorites) {
        match outcome {
            Ok(server_copy) => {
                report.favorites_pushed += 1;
                // A response that lost the flag or predates the local edit
                // would undo it; keep the local copy instead.
                if server_copy.is_favorite != push.is_favorite
                    || server_copy.updated_at < push.expected
                {
                    tracing::debug!(
                        "Restaurant {}: push response is stale, keeping local copy",
                        push.id
                    );
                } else if guarded_put(tx, &server_copy, Some(push.expected))? {
                    report.changed.restaurants = true;
                } else {
                    report.stale_skipped += 1;
                }
            }
            Err(error) => {
                tracing::warn!("Failed to push favorite for restaurant {}: {error}", push.id);
                report.push_failures.push(PushFailure {
                    operation: PushOperation::Favorite,
                    id: push.id.get(),
                    message: error.to_string(),
                });
            }
        }
    }

    for (update, outcome) in plan.review_updates.iter().zip(outcomes.updates) {
        match outcome {
            Ok(server_copy) => {
                report.reviews_updated += 1;
                if !echoes_payload(&server_copy, &update.payload)
                    || server_copy.updated_at < update.expected
                {
                    tracing::debug!(
                        "Review {}: push response is stale, keeping local copy",
                        update.id
                    );
                } else if guarded_put(tx, &server_copy, Some(update.expected))? {
                    report.changed.reviews = true;
                } else {
                    report.stale_skipped += 1;
                }
            }
            Err(error) => {
                tracing::warn!("Failed to push review {}: {error}", update.id);
                report.push_failures.push(PushFailure {
                    operation: PushOperation::UpdateReview,
                    id: update.id.get(),
                    message: error.to_string(),
                });
            }
        }
    }

    let mut confirmed = HashSet::new();
    for (create, outcome) in plan.review_creates.iter().zip(outcomes.creates) {
        match outcome {
            Ok(server_copy) => {
                report.reviews_created += 1;
                confirmed.insert(create.temp_id);
                replace_temporary(tx, create.temp_id, create.expected, server_copy)?;
                report.changed.reviews = true;
            }
            Err(error) => {
                tracing::warn!("Failed to create review {}: {error}", create.temp_id);
                report.push_failures.push(PushFailure {
                    operation: PushOperation::CreateReview,
                    id: create.temp_id.get(),
                    message: error.to_string(),
                });
            }
        }
    }

    for (id, outcome) in plan.review_deletes.iter().zip(outcomes.deletes) {
        match outcome {
            Ok(()) => {
                tx.forget_synced_review(id.get())?;
                report.reviews_deleted += 1;
            }
            Err(error) => {
                tracing::warn!("Failed to delete review {id}: {error}");
                report.push_failures.push(PushFailure {
                    operation: PushOperation::DeleteReview,
                    id: id.get(),
                    message: error.to_string(),
                });
            }
        }
    }

    // Unconfirmed creates are not retried; reviews minted during the pass
    // were not in the snapshot and stay.
    for temporary in &plan.temporary {
        if confirmed.contains(&temporary.record) {
            continue;
        }
        if guarded_delete(tx, temporary)? {
            tracing::warn!("Discarded unsynced review {}", temporary.record);
            report.temporary_purged += 1;
            report.changed.reviews = true;
        } else {
            report.stale_skipped += 1;
        }
    }

    for id in &plan.review_forgets {
        if tx.updated_at_of(Collection::Reviews, id.get())?.is_none() {
            tx.forget_synced_review(id.get())?;
        }
    }

    for conflict in &plan.conflicts {
        tx.log_conflict(conflict)?;
    }
    report.conflicts = plan.conflicts.len();

    Ok(report)
}

/// Swap a temporary review for its confirmed server copy.
///
/// An edit made to the temporary review while the create was in flight is
/// carried over to the confirmed id and stamped newer than the server copy,
/// so the next pass pushes it as an update.
fn replace_temporary(
    tx: &CollectionStore<'_>,
    temp_id: ReviewId,
    expected: i64,
    server_copy: Review,
) -> Result<()> {
    let current = tx.get::<Review>(temp_id.get())?;
    tx.delete(Collection::Reviews, temp_id.get())?;

    match current {
        Some(current) if current.updated_at != expected => {
            tracing::debug!("Review {temp_id} changed during create, keeping the edit");
            let rebased = Review {
                id: server_copy.id,
                created_at: server_copy.created_at,
                updated_at: current.updated_at.max(server_copy.updated_at + 1),
                ..current
            };
            tx.put(&rebased)
        }
        Some(_) => {
            tracing::debug!("Review {temp_id} confirmed as {}", server_copy.id);
            tx.put(&server_copy)
        }
        None => {
            // Deleted locally while the create was in flight; marked so the
            // next pass propagates the delete.
            tracing::debug!("Review {temp_id} deleted during create");
            tx.mark_review_synced(server_copy.id.get())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteOnlyReviewPolicy;
    use crate::models::{RestaurantId, ReviewPayload, Winner};
    use crate::remote::{InMemoryRemote, RemoteCall, RemoteService};
    use crate::services::{MirrorStore, StoreCell};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn restaurant(id: i64, is_favorite: bool, updated_at: i64) -> Restaurant {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("Restaurant {id}"),
            "cuisine_type": "Asian",
            "neighborhood": "Manhattan",
            "is_favorite": is_favorite,
            "updatedAt": updated_at,
        }))
        .unwrap()
    }

    fn review(id: i64, restaurant_id: i64, rating: i32, updated_at: i64) -> Review {
        Review {
            id: ReviewId::new(id),
            restaurant_id: RestaurantId::new(restaurant_id),
            name: "Ann".to_string(),
            rating,
            comments: "Lovely".to_string(),
            created_at: 1,
            updated_at,
        }
    }

    fn setup(
        remote: Arc<dyn RemoteService>,
        policy: RemoteOnlyReviewPolicy,
    ) -> (Reconciler, MirrorStore) {
        let store = MirrorStore::open_in_memory().unwrap();
        let context = SyncContext::new(StoreCell::ready(store.clone()), remote, policy);
        (Reconciler::new(context), store)
    }

    async fn local_state(store: &MirrorStore) -> (Vec<Restaurant>, Vec<Review>) {
        (
            store.get_all().await.unwrap(),
            store.get_all().await.unwrap(),
        )
    }

    #[tokio::test]
    async fn temporary_review_is_created_and_replaced() {
        let remote = InMemoryRemote::new();
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        store.put(&review(-3, 7, 4, 100)).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(
            remote.pushes(),
            vec![RemoteCall::CreateReview(ReviewPayload {
                restaurant_id: Some(RestaurantId::new(7)),
                name: "Ann".to_string(),
                rating: 4,
                comments: "Lovely".to_string(),
            })]
        );
        assert_eq!(report.reviews_created, 1);
        assert_eq!(report.temporary_purged, 0);

        let reviews: Vec<Review> = store.get_all().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, ReviewId::new(1));
        assert_eq!(reviews[0].rating, 4);
        assert_eq!(Some(&reviews[0]), remote.review(ReviewId::new(1)).as_ref());
    }

    #[tokio::test]
    async fn newer_local_favorite_is_pushed_upstream() {
        let remote = InMemoryRemote::with_data(vec![restaurant(7, false, 1_000)], vec![]);
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        store.put(&restaurant(7, true, 2_000)).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(
            remote.pushes(),
            vec![RemoteCall::UpdateFavorite {
                id: RestaurantId::new(7),
                is_favorite: true,
            }]
        );
        assert!(remote.restaurant(RestaurantId::new(7)).unwrap().is_favorite);
        let local: Restaurant = store.get(7).await.unwrap().unwrap();
        assert!(local.is_favorite);
        assert!(local.updated_at >= 2_000);
        assert_eq!(report.conflicts, 1);
        assert_eq!(store.list_conflicts(10).await.unwrap()[0].winner, Winner::Local);
    }

    #[tokio::test]
    async fn newer_remote_restaurant_overwrites_local() {
        let remote = InMemoryRemote::with_data(
            vec![restaurant(1, true, 3_000), restaurant(2, false, 10)],
            vec![],
        );
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        store.put(&restaurant(1, false, 1_000)).await.unwrap();
        store.put(&restaurant(9, false, 1)).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();

        assert!(remote.pushes().is_empty());
        assert_eq!(report.restaurants_pulled, 2);
        let (restaurants, _) = local_state(&store).await;
        let ids = restaurants.iter().map(|r| r.id.get()).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 9]);
        assert_eq!(restaurants[0], restaurant(1, true, 3_000));
    }

    #[tokio::test]
    async fn server_deleted_review_is_removed_without_network_delete() {
        let remote = InMemoryRemote::new();
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        store.put(&review(42, 7, 3, 100)).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.reviews_removed, 1);
        assert!(remote.pushes().is_empty());
        assert!(store.get::<Review>(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_only_review_policies() {
        let remote = InMemoryRemote::with_data(vec![], vec![review(77, 7, 5, 100)]);
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::PropagateDelete);
        store.put(&review(77, 7, 5, 100)).await.unwrap();
        store.delete(Collection::Reviews, 77).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();
        assert_eq!(report.reviews_deleted, 1);
        assert_eq!(remote.pushes(), vec![RemoteCall::DeleteReview(ReviewId::new(77))]);
        assert!(remote.review(ReviewId::new(77)).is_none());
        assert!(store.get::<Review>(77).await.unwrap().is_none());

        let remote = InMemoryRemote::with_data(vec![], vec![review(77, 7, 5, 100)]);
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::MirrorLocally);
        store.put(&review(77, 7, 5, 100)).await.unwrap();
        store.delete(Collection::Reviews, 77).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();
        assert_eq!(report.reviews_pulled, 1);
        assert!(remote.pushes().is_empty());
        assert_eq!(
            store.get::<Review>(77).await.unwrap(),
            Some(review(77, 7, 5, 100))
        );
    }

    #[tokio::test]
    async fn empty_mirror_pulls_existing_reviews_without_deleting() {
        let remote = InMemoryRemote::with_data(
            vec![restaurant(7, false, 100)],
            vec![review(77, 7, 5, 100)],
        );
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::PropagateDelete);

        let report = reconciler.run_pass().await.unwrap();

        assert!(remote.pushes().is_empty());
        assert_eq!(report.reviews_pulled, 1);
        assert!(remote.review(ReviewId::new(77)).is_some());
        assert_eq!(
            store.get::<Review>(77).await.unwrap(),
            Some(review(77, 7, 5, 100))
        );

        // Once held, a local delete is propagated.
        store.delete(Collection::Reviews, 77).await.unwrap();
        reconciler.run_pass().await.unwrap();
        assert_eq!(remote.pushes(), vec![RemoteCall::DeleteReview(ReviewId::new(77))]);
        let synced = store
            .transaction(|tx| tx.synced_review_ids())
            .await
            .unwrap();
        assert!(synced.is_empty());
    }

    #[tokio::test]
    async fn stale_push_response_keeps_local_edit() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let stale_restaurant = serde_json::json!({
            "id": 7,
            "name": "Restaurant 7",
            "is_favorite": "false",
            "updatedAt": 1_000,
        });
        Mock::given(method("GET"))
            .and(path("/restaurants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![stale_restaurant.clone()]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![review(5, 7, 2, 1_000)]))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/restaurants/7"))
            .and(query_param("is_favorite", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stale_restaurant))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/reviews/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(review(5, 7, 2, 1_000)))
            .mount(&server)
            .await;

        let remote = crate::remote::HttpRemote::new(
            server.uri(),
            Some(std::time::Duration::from_secs(5)),
        )
        .unwrap();
        let (reconciler, store) = setup(Arc::new(remote), RemoteOnlyReviewPolicy::default());
        store.put(&restaurant(7, true, 2_000)).await.unwrap();
        store.put(&review(5, 7, 4, 2_000)).await.unwrap();

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.favorites_pushed, 1);
        assert_eq!(report.reviews_updated, 1);
        assert!(report.push_failures.is_empty());
        assert_eq!(
            store.get::<Restaurant>(7).await.unwrap(),
            Some(restaurant(7, true, 2_000))
        );
        assert_eq!(
            store.get::<Review>(5).await.unwrap(),
            Some(review(5, 7, 4, 2_000))
        );
    }

    #[tokio::test]
    async fn second_pass_is_a_noop() {
        let remote = InMemoryRemote::with_data(
            vec![restaurant(1, false, 1_000), restaurant(2, false, 5_000)],
            vec![review(5, 1, 2, 1_000), review(6, 1, 2, 5_000)],
        );
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::MirrorLocally);
        store.put(&restaurant(1, true, 2_000)).await.unwrap();
        store.put(&restaurant(2, true, 1_000)).await.unwrap();
        store.put(&review(5, 1, 4, 2_000)).await.unwrap();
        store.put(&review(6, 1, 4, 1_000)).await.unwrap();
        store.put(&review(-1, 2, 3, 2_000)).await.unwrap();

        let first = reconciler.run_pass().await.unwrap();
        assert_eq!(first.pushed(), 3);
        let settled = local_state(&store).await;

        remote.clear_calls();
        let second = reconciler.run_pass().await.unwrap();

        assert!(second.is_noop(), "{second:?}");
        assert!(remote.pushes().is_empty());
        assert_eq!(local_state(&store).await, settled);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_store_untouched() {
        let remote = InMemoryRemote::with_data(vec![restaurant(1, false, 9_000)], vec![]);
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        store.put(&restaurant(1, true, 1_000)).await.unwrap();
        store.put(&review(-1, 1, 3, 1_000)).await.unwrap();
        store.put(&review(42, 1, 3, 1_000)).await.unwrap();
        let before = local_state(&store).await;
        let tag = reconciler.context().register_sync();

        remote.set_offline(true);
        let error = reconciler.run_pass().await.unwrap_err();

        assert!(matches!(error, Error::RemoteUnreachable(_)));
        assert_eq!(local_state(&store).await, before);
        assert!(remote.pushes().is_empty());
        assert_eq!(reconciler.context().pending_sync(), Some(tag));
        assert_eq!(reconciler.context().state(), SyncState::Error);
    }

    #[tokio::test]
    async fn failed_create_is_purged_and_reported() {
        let remote = InMemoryRemote::new();
        let (reconciler, store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        store.put(&review(-1, 7, 3, 1_000)).await.unwrap();
        reconciler.context().register_sync();

        remote.set_reject_writes(true);
        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.push_failures.len(), 1);
        assert_eq!(report.push_failures[0].operation, PushOperation::CreateReview);
        assert_eq!(report.temporary_purged, 1);
        assert!(store.get_all::<Review>().await.unwrap().is_empty());
        assert!(reconciler.context().pending_sync().is_some());
    }

    #[tokio::test]
    async fn successful_pass_clears_registration_and_notifies() {
        let remote = InMemoryRemote::with_data(vec![restaurant(1, false, 10)], vec![]);
        let (reconciler, _store) = setup(Arc::new(remote), RemoteOnlyReviewPolicy::default());
        let mut events = reconciler.context().subscribe();
        reconciler.context().register_sync();

        reconciler.run_pass().await.unwrap();

        assert_eq!(reconciler.context().pending_sync(), None);
        assert_eq!(reconciler.context().state(), SyncState::Synced);
        let change = events.recv().await.unwrap();
        assert!(change.restaurants);
        assert!(!change.reviews);

        let report = reconciler.run_pass().await.unwrap();
        assert!(report.is_noop());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn overlapping_pass_is_rejected() {
        let remote = InMemoryRemote::new();
        let (reconciler, _store) = setup(Arc::new(remote.clone()), RemoteOnlyReviewPolicy::default());
        remote.hold_fetches();

        let running = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.run_pass().await }
        });
        while !reconciler.context().pass_in_flight() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            reconciler.run_pass().await,
            Err(Error::SyncInProgress)
        ));

        remote.release_fetches();
        running.await.unwrap().unwrap();
        assert!(!reconciler.context().pass_in_flight());
    }

    /// Toggles the favorite locally while the favorite push is in flight.
    struct EditDuringPush {
        inner: InMemoryRemote,
        store: MirrorStore,
    }

    #[async_trait]
    impl RemoteService for EditDuringPush {
        async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
            self.inner.fetch_restaurants().await
        }

        async fn fetch_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>> {
            self.inner.fetch_restaurant(id).await
        }

        async fn update_restaurant_favorite(
            &self,
            id: RestaurantId,
            is_favorite: bool,
        ) -> Result<Restaurant> {
            self.store.put(&restaurant(id.get(), !is_favorite, 3_000)).await?;
            self.inner.update_restaurant_favorite(id, is_favorite).await
        }

        async fn fetch_reviews(&self) -> Result<Vec<Review>> {
            self.inner.fetch_reviews().await
        }

        async fn fetch_review(&self, id: ReviewId) -> Result<Option<Review>> {
            self.inner.fetch_review(id).await
        }

        async fn create_review(&self, payload: &ReviewPayload) -> Result<Review> {
            self.inner.create_review(payload).await
        }

        async fn update_review(&self, id: ReviewId, payload: &ReviewPayload) -> Result<Review> {
            self.inner.update_review(id, payload).await
        }

        async fn delete_review(&self, id: ReviewId) -> Result<()> {
            self.inner.delete_review(id).await
        }
    }

    #[tokio::test]
    async fn edit_during_pass_is_not_overwritten() {
        let inner = InMemoryRemote::with_data(vec![restaurant(7, false, 1_000)], vec![]);
        let store = MirrorStore::open_in_memory().unwrap();
        store.put(&restaurant(7, true, 2_000)).await.unwrap();
        let remote = EditDuringPush {
            inner: inner.clone(),
            store: store.clone(),
        };
        let context = SyncContext::new(
            StoreCell::ready(store.clone()),
            Arc::new(remote),
            RemoteOnlyReviewPolicy::default(),
        );
        let reconciler = Reconciler::new(context);

        let report = reconciler.run_pass().await.unwrap();

        assert_eq!(report.favorites_pushed, 1);
        assert_eq!(report.stale_skipped, 1);
        assert_eq!(
            store.get::<Restaurant>(7).await.unwrap(),
            Some(restaurant(7, false, 3_000))
        );
    }

    #[tokio::test]
    async fn edit_to_temporary_review_survives_create() {
        let store = MirrorStore::open_in_memory().unwrap();
        store.put(&review(-2, 7, 3, 1_000)).await.unwrap();
        let tx_result = store
            .transaction(|tx| {
                replace_temporary(tx, ReviewId::new(-2), 500, review(12, 7, 3, 1_500))?;
                tx.get::<Review>(12)
            })
            .await
            .unwrap()
            .unwrap();

        assert!(store.get::<Review>(-2).await.unwrap().is_none());
        assert_eq!(tx_result.id, ReviewId::new(12));
        assert_eq!(tx_result.updated_at, 1_501);
    }
}
