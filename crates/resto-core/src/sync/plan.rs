//! Pure reconciliation planning.
//!
//! Compares a local and a remote snapshot and decides, per record, what to
//! write locally and what to push. Nothing here touches the store or the
//! network.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::RemoteOnlyReviewPolicy;
use crate::models::{
    Collection, Restaurant, RestaurantId, Review, ReviewId, ReviewPayload, SyncConflict, Winner,
};

/// Both collections as seen by one side at one moment
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub restaurants: Vec<Restaurant>,
    pub reviews: Vec<Review>,
    /// Confirmed review ids the mirror has held (local side only)
    pub synced_reviews: BTreeSet<ReviewId>,
}

/// A local write that only applies if the stored `updatedAt` still matches
/// `expected` (`None`: the record must still be absent).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Guarded<T> {
    pub record: T,
    pub expected: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FavoritePush {
    pub id: RestaurantId,
    pub is_favorite: bool,
    pub expected: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReviewUpdate {
    pub id: ReviewId,
    pub payload: ReviewPayload,
    pub expected: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReviewCreate {
    pub temp_id: ReviewId,
    pub payload: ReviewPayload,
    pub expected: i64,
}

/// Everything one pass intends to do
#[derive(Debug, Default)]
pub(crate) struct SyncPlan {
    /// Remote wins and remote-only inserts
    pub restaurant_writes: Vec<Guarded<Restaurant>>,
    /// Remote wins, plus remote-only inserts when mirroring locally
    pub review_writes: Vec<Guarded<Review>>,
    /// Confirmed reviews the service no longer has
    pub review_removals: Vec<Guarded<ReviewId>>,
    pub favorite_pushes: Vec<FavoritePush>,
    pub review_updates: Vec<ReviewUpdate>,
    pub review_creates: Vec<ReviewCreate>,
    pub review_deletes: Vec<ReviewId>,
    /// Synced marks for reviews neither side has any more
    pub review_forgets: Vec<ReviewId>,
    /// Temporary reviews present in the local snapshot
    pub temporary: Vec<Guarded<ReviewId>>,
    pub conflicts: Vec<SyncConflict>,
}

impl SyncPlan {
    pub fn push_count(&self) -> usize {
        self.favorite_pushes.len()
            + self.review_updates.len()
            + self.review_creates.len()
            + self.review_deletes.len()
    }
}

fn conflict(
    collection: Collection,
    record_id: i64,
    local_updated_at: i64,
    remote_updated_at: i64,
    resolved_at: i64,
) -> SyncConflict {
    SyncConflict {
        id: 0,
        collection,
        record_id,
        local_updated_at,
        remote_updated_at,
        winner: if local_updated_at > remote_updated_at {
            Winner::Local
        } else {
            Winner::Remote
        },
        resolved_at,
    }
}

/// Decide one pass from the two snapshots.
pub(crate) fn plan_pass(
    local: &Snapshot,
    remote: &Snapshot,
    remote_only_reviews: RemoteOnlyReviewPolicy,
    now_ms: i64,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    plan_restaurants(&mut plan, &local.restaurants, &remote.restaurants, now_ms);
    plan_reviews(
        &mut plan,
        local,
        &remote.reviews,
        remote_only_reviews,
        now_ms,
    );
    plan
}

fn plan_restaurants(
    plan: &mut SyncPlan,
    local: &[Restaurant],
    remote: &[Restaurant],
    now_ms: i64,
) {
    let local_by_id = local
        .iter()
        .map(|restaurant| (restaurant.id, restaurant))
        .collect::<BTreeMap<_, _>>();

    // Local-only restaurants stay: they are never deleted locally.
    for remote_copy in remote {
        let Some(local_copy) = local_by_id.get(&remote_copy.id) else {
            tracing::debug!("Restaurant {} is new", remote_copy.id);
            plan.restaurant_writes.push(Guarded {
                record: remote_copy.clone(),
                expected: None,
            });
            continue;
        };

        if local_copy.updated_at == remote_copy.updated_at {
            continue;
        }
        plan.conflicts.push(conflict(
            Collection::Restaurants,
            remote_copy.id.get(),
            local_copy.updated_at,
            remote_copy.updated_at,
            now_ms,
        ));

        if local_copy.updated_at > remote_copy.updated_at {
            tracing::debug!("Restaurant {}: local is newer, pushing favorite", local_copy.id);
            plan.favorite_pushes.push(FavoritePush {
                id: local_copy.id,
                is_favorite: local_copy.is_favorite,
                expected: local_copy.updated_at,
            });
        } else {
            tracing::debug!("Restaurant {}: remote is newer", remote_copy.id);
            plan.restaurant_writes.push(Guarded {
                record: remote_copy.clone(),
                expected: Some(local_copy.updated_at),
            });
        }
    }
}

fn plan_reviews(
    plan: &mut SyncPlan,
    local: &Snapshot,
    remote: &[Review],
    remote_only_reviews: RemoteOnlyReviewPolicy,
    now_ms: i64,
) {
    let local_by_id = local
        .reviews
        .iter()
        .map(|review| (review.id, review))
        .collect::<BTreeMap<_, _>>();
    let mut remote_by_id = BTreeMap::new();
    for review in remote {
        if review.is_temporary() {
            tracing::warn!("Ignoring remote review with non-positive id {}", review.id);
            continue;
        }
        remote_by_id.insert(review.id, review);
    }

    // Present on both sides, then local only.
    for (id, local_copy) in &local_by_id {
        match remote_by_id.get(id) {
            Some(remote_copy) => {
                if local_copy.updated_at == remote_copy.updated_at {
                    continue;
                }
                plan.conflicts.push(conflict(
                    Collection::Reviews,
                    id.get(),
                    local_copy.updated_at,
                    remote_copy.updated_at,
                    now_ms,
                ));
                if remote_copy.updated_at > local_copy.updated_at {
                    tracing::debug!("Review {id}: remote is newer");
                    plan.review_writes.push(Guarded {
                        record: (*remote_copy).clone(),
                        expected: Some(local_copy.updated_at),
                    });
                } else {
                    tracing::debug!("Review {id}: local is newer, pushing update");
                    plan.review_updates.push(ReviewUpdate {
                        id: *id,
                        payload: local_copy.update_payload(),
                        expected: local_copy.updated_at,
                    });
                }
            }
            None if id.is_temporary() => {
                tracing::debug!("Review {id} was never synced, pushing create");
                plan.review_creates.push(ReviewCreate {
                    temp_id: *id,
                    payload: local_copy.create_payload(),
                    expected: local_copy.updated_at,
                });
                plan.temporary.push(Guarded {
                    record: *id,
                    expected: Some(local_copy.updated_at),
                });
            }
            None => {
                tracing::debug!("Review {id} was deleted on the data service");
                plan.review_removals.push(Guarded {
                    record: *id,
                    expected: Some(local_copy.updated_at),
                });
            }
        }
    }

    // Remote only. A review this mirror never held is new, not deleted.
    for (id, remote_copy) in &remote_by_id {
        if local_by_id.contains_key(id) {
            continue;
        }
        if !local.synced_reviews.contains(id) {
            tracing::debug!("Review {id} is new");
            plan.review_writes.push(Guarded {
                record: (*remote_copy).clone(),
                expected: None,
            });
            continue;
        }
        match remote_only_reviews {
            RemoteOnlyReviewPolicy::PropagateDelete => {
                tracing::debug!("Review {id} was deleted locally, pushing delete");
                plan.review_deletes.push(*id);
            }
            RemoteOnlyReviewPolicy::MirrorLocally => {
                tracing::debug!("Review {id} was deleted locally, mirroring it back");
                plan.review_writes.push(Guarded {
                    record: (*remote_copy).clone(),
                    expected: None,
                });
            }
        }
    }

    plan.review_forgets.extend(
        local
            .synced_reviews
            .iter()
            .filter(|id| !local_by_id.contains_key(*id) && !remote_by_id.contains_key(*id))
            .copied(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn restaurant(id: i64, is_favorite: bool, updated_at: i64) -> Restaurant {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("Restaurant {id}"),
            "is_favorite": is_favorite,
            "updatedAt": updated_at,
        }))
        .unwrap()
    }

    fn review(id: i64, rating: i32, updated_at: i64) -> Review {
        Review {
            id: ReviewId::new(id),
            restaurant_id: RestaurantId::new(7),
            name: "Ann".to_string(),
            rating,
            comments: "Lovely".to_string(),
            created_at: 1,
            updated_at,
        }
    }

    fn snapshot(restaurants: Vec<Restaurant>, reviews: Vec<Review>) -> Snapshot {
        let synced_reviews = reviews
            .iter()
            .map(|review| review.id)
            .filter(|id| !id.is_temporary())
            .collect();
        Snapshot {
            restaurants,
            reviews,
            synced_reviews,
        }
    }

    #[test]
    fn newer_local_favorite_is_pushed() {
        let local = snapshot(vec![restaurant(7, true, 20)], vec![]);
        let remote = snapshot(vec![restaurant(7, false, 10)], vec![]);

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::default(), 99);
        assert_eq!(
            plan.favorite_pushes,
            vec![FavoritePush {
                id: RestaurantId::new(7),
                is_favorite: true,
                expected: 20,
            }]
        );
        assert!(plan.restaurant_writes.is_empty());
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].winner, Winner::Local);
    }

    #[test]
    fn newer_remote_restaurant_overwrites_and_new_ones_insert() {
        let local = snapshot(vec![restaurant(1, true, 10), restaurant(3, false, 5)], vec![]);
        let remote = snapshot(vec![restaurant(1, false, 30), restaurant(2, false, 1)], vec![]);

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::default(), 99);
        let writes = plan
            .restaurant_writes
            .iter()
            .map(|write| (write.record.id.get(), write.expected))
            .collect::<Vec<_>>();
        assert_eq!(writes, vec![(1, Some(10)), (2, None)]);
        assert!(plan.favorite_pushes.is_empty());
        assert_eq!(plan.conflicts[0].winner, Winner::Remote);
    }

    #[test]
    fn equal_timestamps_do_nothing() {
        let local = snapshot(vec![restaurant(1, true, 10)], vec![review(5, 3, 10)]);
        let remote = snapshot(vec![restaurant(1, false, 10)], vec![review(5, 1, 10)]);

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::default(), 99);
        assert_eq!(plan.push_count(), 0);
        assert!(plan.restaurant_writes.is_empty());
        assert!(plan.review_writes.is_empty());
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn review_phases() {
        let mut local = snapshot(
            vec![],
            vec![
                review(-3, 4, 50),
                review(5, 2, 40),
                review(6, 2, 10),
                review(42, 5, 10),
            ],
        );
        let remote = snapshot(
            vec![],
            vec![review(5, 1, 20), review(6, 1, 30), review(77, 3, 10)],
        );
        // 77 was deleted locally, 88 is gone on both sides.
        local.synced_reviews.insert(ReviewId::new(77));
        local.synced_reviews.insert(ReviewId::new(88));

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::PropagateDelete, 99);

        assert_eq!(plan.review_creates.len(), 1);
        assert_eq!(plan.review_creates[0].temp_id, ReviewId::new(-3));
        assert_eq!(
            plan.review_creates[0].payload.restaurant_id,
            Some(RestaurantId::new(7))
        );
        assert_eq!(plan.review_creates[0].payload.rating, 4);

        assert_eq!(plan.review_updates.len(), 1);
        assert_eq!(plan.review_updates[0].id, ReviewId::new(5));
        assert_eq!(plan.review_updates[0].payload.restaurant_id, None);

        assert_eq!(plan.review_writes.len(), 1);
        assert_eq!(plan.review_writes[0].record.id, ReviewId::new(6));

        assert_eq!(
            plan.review_removals,
            vec![Guarded {
                record: ReviewId::new(42),
                expected: Some(10),
            }]
        );
        assert_eq!(plan.review_deletes, vec![ReviewId::new(77)]);
        assert_eq!(plan.review_forgets, vec![ReviewId::new(88)]);
        assert_eq!(
            plan.temporary,
            vec![Guarded {
                record: ReviewId::new(-3),
                expected: Some(50),
            }]
        );
        assert_eq!(plan.conflicts.len(), 2);
    }

    #[test]
    fn mirror_policy_restores_locally_deleted_reviews() {
        let mut local = snapshot(vec![], vec![]);
        local.synced_reviews.insert(ReviewId::new(77));
        let remote = snapshot(vec![], vec![review(77, 3, 10)]);

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::MirrorLocally, 99);
        assert!(plan.review_deletes.is_empty());
        assert_eq!(
            plan.review_writes,
            vec![Guarded {
                record: review(77, 3, 10),
                expected: None,
            }]
        );
    }

    #[test]
    fn never_seen_remote_review_is_mirrored_not_deleted() {
        let local = snapshot(vec![], vec![]);
        let remote = snapshot(vec![], vec![review(77, 3, 10)]);

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::PropagateDelete, 99);
        assert!(plan.review_deletes.is_empty());
        assert_eq!(
            plan.review_writes,
            vec![Guarded {
                record: review(77, 3, 10),
                expected: None,
            }]
        );
        assert!(plan.review_forgets.is_empty());
    }

    #[test]
    fn remote_temporary_ids_are_ignored() {
        let local = snapshot(vec![], vec![]);
        let remote = snapshot(vec![], vec![review(0, 3, 10)]);

        let plan = plan_pass(&local, &remote, RemoteOnlyReviewPolicy::MirrorLocally, 99);
        assert!(plan.review_writes.is_empty());
        assert_eq!(plan.push_count(), 0);
    }
}
