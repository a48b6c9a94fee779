//! In-process data service used by tests and offline demos.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::RemoteService;
use crate::models::{Restaurant, RestaurantId, Review, ReviewId, ReviewPayload};
use crate::util::now_ms;
use crate::{Error, Result};

/// One request received by an [`InMemoryRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    FetchRestaurants,
    FetchRestaurant(RestaurantId),
    UpdateFavorite {
        id: RestaurantId,
        is_favorite: bool,
    },
    FetchReviews,
    FetchReview(ReviewId),
    CreateReview(ReviewPayload),
    UpdateReview {
        id: ReviewId,
        payload: ReviewPayload,
    },
    DeleteReview(ReviewId),
}

impl RemoteCall {
    /// Whether the call writes to the service.
    pub const fn is_push(&self) -> bool {
        matches!(
            self,
            Self::UpdateFavorite { .. }
                | Self::CreateReview(_)
                | Self::UpdateReview { .. }
                | Self::DeleteReview(_)
        )
    }
}

#[derive(Default)]
struct RemoteState {
    restaurants: BTreeMap<i64, Restaurant>,
    reviews: BTreeMap<i64, Review>,
    last_review_id: i64,
    last_stamp: i64,
    calls: Vec<RemoteCall>,
    fail_fetches: bool,
    reject_writes: bool,
}

impl RemoteState {
    /// Server-side `updatedAt`, strictly increasing across writes.
    fn stamp(&mut self) -> i64 {
        self.last_stamp = now_ms().max(self.last_stamp + 1);
        self.last_stamp
    }

    fn check_fetch(&self) -> Result<()> {
        if self.fail_fetches {
            return Err(Error::RemoteUnreachable(
                "data service is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.check_fetch()?;
        if self.reject_writes {
            return Err(rejected(503, "writes are disabled"));
        }
        Ok(())
    }
}

/// [`RemoteService`] that keeps both collections in memory.
///
/// Every request is appended to a call log. Fetches can be made to fail or
/// to wait on a gate, which lets callers hold a sync pass open.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
    fetch_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the service with existing records.
    pub fn with_data(restaurants: Vec<Restaurant>, reviews: Vec<Review>) -> Self {
        let remote = Self::new();
        for restaurant in restaurants {
            remote.insert_restaurant(restaurant);
        }
        for review in reviews {
            remote.insert_review(review);
        }
        remote
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a restaurant as-is, bypassing the call log.
    pub fn insert_restaurant(&self, restaurant: Restaurant) {
        let mut state = self.lock();
        state.last_stamp = state.last_stamp.max(restaurant.updated_at);
        state.restaurants.insert(restaurant.id.get(), restaurant);
    }

    /// Store a review as-is, bypassing the call log.
    pub fn insert_review(&self, review: Review) {
        let mut state = self.lock();
        state.last_stamp = state.last_stamp.max(review.updated_at);
        state.last_review_id = state.last_review_id.max(review.id.get());
        state.reviews.insert(review.id.get(), review);
    }

    /// Drop a review without logging a call (another client deleted it).
    pub fn remove_review(&self, id: ReviewId) -> Option<Review> {
        self.lock().reviews.remove(&id.get())
    }

    pub fn restaurant(&self, id: RestaurantId) -> Option<Restaurant> {
        self.lock().restaurants.get(&id.get()).cloned()
    }

    pub fn review(&self, id: ReviewId) -> Option<Review> {
        self.lock().reviews.get(&id.get()).cloned()
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.lock().reviews.values().cloned().collect()
    }

    /// Every request received so far, oldest first.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Write requests received so far, oldest first.
    pub fn pushes(&self) -> Vec<RemoteCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_push())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every request fail as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock().fail_fetches = offline;
    }

    /// Make every write fail with a 503 while reads keep working.
    pub fn set_reject_writes(&self, reject: bool) {
        self.lock().reject_writes = reject;
    }

    /// Park collection fetches until [`Self::release_fetches`] is called.
    pub fn hold_fetches(&self) {
        let mut gate = self.fetch_gate.lock().unwrap_or_else(PoisonError::into_inner);
        *gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let parked and future fetches through.
    pub fn release_fetches(&self) {
        let gate = self
            .fetch_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            gate.close();
        }
    }

    async fn wait_for_gate(&self) {
        let gate = self
            .fetch_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            // A closed gate yields an error, which is the release signal.
            let _ = gate.acquire().await;
        }
    }
}

#[async_trait]
impl RemoteService for InMemoryRemote {
    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
        self.lock().calls.push(RemoteCall::FetchRestaurants);
        self.wait_for_gate().await;
        let state = self.lock();
        state.check_fetch()?;
        Ok(state.restaurants.values().cloned().collect())
    }

    async fn fetch_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchRestaurant(id));
        state.check_fetch()?;
        Ok(state.restaurants.get(&id.get()).cloned())
    }

    async fn update_restaurant_favorite(
        &self,
        id: RestaurantId,
        is_favorite: bool,
    ) -> Result<Restaurant> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::UpdateFavorite { id, is_favorite });
        state.check_write()?;
        let stamp = state.stamp();
        let restaurant = state
            .restaurants
            .get_mut(&id.get())
            .ok_or_else(|| rejected(404, "restaurant not found"))?;
        restaurant.is_favorite = is_favorite;
        restaurant.updated_at = stamp;
        Ok(restaurant.clone())
    }

    async fn fetch_reviews(&self) -> Result<Vec<Review>> {
        self.lock().calls.push(RemoteCall::FetchReviews);
        self.wait_for_gate().await;
        let state = self.lock();
        state.check_fetch()?;
        Ok(state.reviews.values().cloned().collect())
    }

    async fn fetch_review(&self, id: ReviewId) -> Result<Option<Review>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchReview(id));
        state.check_fetch()?;
        Ok(state.reviews.get(&id.get()).cloned())
    }

    async fn create_review(&self, payload: &ReviewPayload) -> Result<Review> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateReview(payload.clone()));
        state.check_write()?;
        let restaurant_id = payload
            .restaurant_id
            .ok_or_else(|| rejected(400, "restaurant_id is required"))?;

        let stamp = state.stamp();
        state.last_review_id += 1;
        let review = Review {
            id: ReviewId::new(state.last_review_id),
            restaurant_id,
            name: payload.name.clone(),
            rating: payload.rating,
            comments: payload.comments.clone(),
            created_at: stamp,
            updated_at: stamp,
        };
        state.reviews.insert(review.id.get(), review.clone());
        Ok(review)
    }

    async fn update_review(&self, id: ReviewId, payload: &ReviewPayload) -> Result<Review> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::UpdateReview {
            id,
            payload: payload.clone(),
        });
        state.check_write()?;
        let stamp = state.stamp();
        let review = state
            .reviews
            .get_mut(&id.get())
            .ok_or_else(|| rejected(404, "review not found"))?;
        review.name.clone_from(&payload.name);
        review.rating = payload.rating;
        review.comments.clone_from(&payload.comments);
        review.updated_at = stamp;
        Ok(review.clone())
    }

    async fn delete_review(&self, id: ReviewId) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::DeleteReview(id));
        state.check_write()?;
        state.reviews.remove(&id.get());
        Ok(())
    }
}

fn rejected(status: u16, message: &str) -> Error {
    Error::RemoteRejected {
        status,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(restaurant_id: i64) -> ReviewPayload {
        ReviewPayload {
            restaurant_id: Some(RestaurantId::new(restaurant_id)),
            name: "Ann".to_string(),
            rating: 4,
            comments: "Lovely".to_string(),
        }
    }

    #[tokio::test]
    async fn create_assigns_next_positive_id() {
        let remote = InMemoryRemote::new();
        remote.insert_review(Review {
            id: ReviewId::new(30),
            restaurant_id: RestaurantId::new(1),
            name: "Old".to_string(),
            rating: 1,
            comments: "Meh".to_string(),
            created_at: 1,
            updated_at: 1,
        });

        let created = remote.create_review(&payload(7)).await.unwrap();
        assert_eq!(created.id, ReviewId::new(31));
        assert_eq!(created.restaurant_id, RestaurantId::new(7));
        assert!(created.updated_at > 1);
        assert_eq!(remote.pushes(), vec![RemoteCall::CreateReview(payload(7))]);
    }

    #[tokio::test]
    async fn create_without_restaurant_is_rejected() {
        let remote = InMemoryRemote::new();
        let mut body = payload(7);
        body.restaurant_id = None;

        let error = remote.create_review(&body).await.unwrap_err();
        assert!(matches!(error, Error::RemoteRejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn offline_remote_fails_every_call() {
        let remote = InMemoryRemote::new();
        remote.set_offline(true);

        assert!(matches!(
            remote.fetch_reviews().await,
            Err(Error::RemoteUnreachable(_))
        ));
        assert!(remote.delete_review(ReviewId::new(1)).await.is_err());
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn held_fetch_waits_for_release() {
        let remote = InMemoryRemote::new();
        remote.hold_fetches();

        let pending = tokio::spawn({
            let remote = remote.clone();
            async move { remote.fetch_restaurants().await }
        });
        while remote.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(!pending.is_finished());

        remote.release_fetches();
        assert!(pending.await.unwrap().unwrap().is_empty());
    }
}
