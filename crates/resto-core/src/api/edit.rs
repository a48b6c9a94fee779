//! Local edits that are pushed on the next sync

use crate::context::{DataChanged, SyncContext};
use crate::models::{Collection, Restaurant, RestaurantId, Review, ReviewId};
use crate::util::now_ms;
use crate::{Error, Result};

/// `updatedAt` for a local edit, strictly newer than the stored copy.
fn edit_stamp(previous: Option<i64>) -> i64 {
    previous.map_or_else(now_ms, |previous| now_ms().max(previous + 1))
}

#[derive(Clone)]
pub struct EditApi {
    context: SyncContext,
}

impl EditApi {
    pub const fn new(context: SyncContext) -> Self {
        Self { context }
    }

    /// Empty review for `restaurant_id` under a fresh temporary id.
    ///
    /// The draft is not stored until [`Self::save_review`].
    pub async fn new_review_draft(&self, restaurant_id: RestaurantId) -> Result<Review> {
        let id = self.context.store().await?.next_local_review_id().await?;
        Ok(Review::draft(id, restaurant_id, now_ms()))
    }

    /// Validate and store a review, then register a sync.
    pub async fn save_review(&self, mut review: Review) -> Result<Review> {
        review.validate()?;
        let store = self.context.store().await?;

        let saved = store
            .transaction(|tx| {
                let previous = tx.updated_at_of(Collection::Reviews, review.id.get())?;
                review.updated_at = edit_stamp(previous);
                if review.created_at == 0 {
                    review.created_at = review.updated_at;
                }
                tx.put(&review)?;
                Ok(review)
            })
            .await?;

        tracing::debug!("Saved review {} for restaurant {}", saved.id, saved.restaurant_id);
        self.after_edit(DataChanged {
            restaurants: false,
            reviews: true,
        });
        Ok(saved)
    }

    /// Remove a review locally; the next pass deletes it remotely.
    pub async fn delete_review(&self, id: ReviewId) -> Result<()> {
        let store = self.context.store().await?;
        if !store.delete(Collection::Reviews, id.get()).await? {
            return Err(Error::RecordNotFound {
                collection: Collection::Reviews,
                id: id.get(),
            });
        }

        tracing::debug!("Deleted review {id}");
        self.after_edit(DataChanged {
            restaurants: false,
            reviews: true,
        });
        Ok(())
    }

    /// Flip a restaurant's favorite flag and return the stored record.
    pub async fn toggle_favorite(&self, id: RestaurantId) -> Result<Restaurant> {
        let store = self.context.store().await?;
        let restaurant = store
            .transaction(|tx| {
                let mut restaurant = tx.get::<Restaurant>(id.get())?.ok_or(Error::RecordNotFound {
                    collection: Collection::Restaurants,
                    id: id.get(),
                })?;
                let stamp = edit_stamp(Some(restaurant.updated_at));
                restaurant.toggle_favorite(stamp);
                tx.put(&restaurant)?;
                Ok(restaurant)
            })
            .await?;

        tracing::debug!(
            "Restaurant {id} favorite is now {}",
            restaurant.is_favorite
        );
        self.after_edit(DataChanged {
            restaurants: true,
            reviews: false,
        });
        Ok(restaurant)
    }

    fn after_edit(&self, change: DataChanged) {
        self.context.register_sync();
        self.context.notify(change);
    }
}
