//! Remote data service client.
//!
//! Every call is a single request with no retry; retry policy belongs to the
//! sync trigger. The service returns whole collections, so there is no
//! pagination or partial fetch.

mod http;
mod memory;

use async_trait::async_trait;

use crate::models::{Restaurant, RestaurantId, Review, ReviewId, ReviewPayload};
use crate::Result;

pub use http::HttpRemote;
pub use memory::{InMemoryRemote, RemoteCall};

/// Operations offered by the restaurant data service
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// `GET /restaurants`
    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>>;

    /// `GET /restaurants/:id`, `None` when the service does not know the id
    async fn fetch_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>>;

    /// `PUT /restaurants/:id?is_favorite=<bool>`, returns the stored record
    async fn update_restaurant_favorite(
        &self,
        id: RestaurantId,
        is_favorite: bool,
    ) -> Result<Restaurant>;

    /// `GET /reviews`
    async fn fetch_reviews(&self) -> Result<Vec<Review>>;

    /// `GET /reviews/:id`, `None` when the service does not know the id
    async fn fetch_review(&self, id: ReviewId) -> Result<Option<Review>>;

    /// `POST /reviews`, returns the record with its server-assigned id
    async fn create_review(&self, payload: &ReviewPayload) -> Result<Review>;

    /// `PUT /reviews/:id`, returns the stored record
    async fn update_review(&self, id: ReviewId, payload: &ReviewPayload) -> Result<Review>;

    /// `DELETE /reviews/:id`; deleting an unknown id succeeds
    async fn delete_review(&self, id: ReviewId) -> Result<()>;
}
