//! Read API over the local mirror

use tokio::task::JoinHandle;

use crate::context::{DataChanged, SyncContext};
use crate::models::{sort_newest_first, Collection, Restaurant, RestaurantId, Review, ReviewId};
use crate::util::unique_in_order;
use crate::Result;

/// Filter value meaning "no filter on this dimension"
pub const ALL_FILTER: &str = "all";

/// A restaurant with its reviews, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantDetail {
    pub restaurant: Restaurant,
    pub reviews: Vec<Review>,
}

/// Restaurants matching both filters. Matches are exact and case-sensitive;
/// [`ALL_FILTER`] disables a dimension.
pub fn filter_restaurants(
    restaurants: Vec<Restaurant>,
    cuisine: &str,
    neighborhood: &str,
) -> Vec<Restaurant> {
    restaurants
        .into_iter()
        .filter(|restaurant| cuisine == ALL_FILTER || restaurant.cuisine_type == cuisine)
        .filter(|restaurant| neighborhood == ALL_FILTER || restaurant.neighborhood == neighborhood)
        .collect()
}

#[derive(Clone)]
pub struct ReadApi {
    context: SyncContext,
}

impl ReadApi {
    pub const fn new(context: SyncContext) -> Self {
        Self { context }
    }

    /// All local restaurants.
    ///
    /// With `force_refresh` a background fetch-and-replace starts as well;
    /// the returned records are the snapshot from before it.
    pub async fn fetch_restaurants(&self, force_refresh: bool) -> Result<Vec<Restaurant>> {
        let restaurants = self.context.store().await?.get_all().await?;
        if force_refresh {
            self.spawn_refresh(Collection::Restaurants);
        }
        Ok(restaurants)
    }

    /// All local reviews, with the same refresh behavior as
    /// [`Self::fetch_restaurants`].
    pub async fn fetch_reviews(&self, force_refresh: bool) -> Result<Vec<Review>> {
        let reviews = self.context.store().await?.get_all().await?;
        if force_refresh {
            self.spawn_refresh(Collection::Reviews);
        }
        Ok(reviews)
    }

    /// Start [`Self::refresh`] in the background; failures are only logged.
    pub fn spawn_refresh(&self, collection: Collection) -> JoinHandle<()> {
        let api = self.clone();
        tokio::spawn(async move {
            if let Err(error) = api.refresh(collection).await {
                tracing::warn!("Background refresh of {collection} failed: {error}");
            }
        })
    }

    /// Replace a local collection with the remote one in one transaction.
    ///
    /// Temporary reviews are kept since the service has never seen them.
    pub async fn refresh(&self, collection: Collection) -> Result<usize> {
        let store = self.context.store().await?;
        let remote = self.context.remote();

        let count = match collection {
            Collection::Restaurants => {
                let restaurants = remote.fetch_restaurants().await?;
                store.replace_all(&restaurants).await?;
                restaurants.len()
            }
            Collection::Reviews => {
                let reviews = remote.fetch_reviews().await?;
                store
                    .transaction(|tx| {
                        let pending = tx
                            .get_all::<Review>()?
                            .into_iter()
                            .filter(Review::is_temporary)
                            .collect::<Vec<_>>();
                        tx.clear(Collection::Reviews)?;
                        for review in reviews.iter().filter(|review| !review.is_temporary()) {
                            tx.put(review)?;
                        }
                        for review in &pending {
                            tx.put(review)?;
                        }
                        Ok(())
                    })
                    .await?;
                reviews.len()
            }
        };

        tracing::debug!("Refreshed {count} {collection} from the data service");
        self.context.notify(DataChanged {
            restaurants: collection == Collection::Restaurants,
            reviews: collection == Collection::Reviews,
        });
        Ok(count)
    }

    /// A restaurant and its reviews sorted newest first.
    pub async fn fetch_restaurant_by_id(
        &self,
        id: RestaurantId,
    ) -> Result<Option<RestaurantDetail>> {
        let store = self.context.store().await?;
        let Some(restaurant) = store.get::<Restaurant>(id.get()).await? else {
            return Ok(None);
        };
        let mut reviews = store.reviews_for_restaurant(id.get()).await?;
        sort_newest_first(&mut reviews);
        Ok(Some(RestaurantDetail {
            restaurant,
            reviews,
        }))
    }

    pub async fn fetch_review_by_id(&self, id: ReviewId) -> Result<Option<Review>> {
        self.context.store().await?.get(id.get()).await
    }

    /// Reviews of one restaurant, newest first.
    pub async fn fetch_restaurant_reviews(&self, id: RestaurantId) -> Result<Vec<Review>> {
        let mut reviews = self
            .context
            .store()
            .await?
            .reviews_for_restaurant(id.get())
            .await?;
        sort_newest_first(&mut reviews);
        Ok(reviews)
    }

    pub async fn fetch_by_cuisine(&self, cuisine: &str) -> Result<Vec<Restaurant>> {
        self.fetch_by_cuisine_and_neighborhood(cuisine, ALL_FILTER)
            .await
    }

    pub async fn fetch_by_neighborhood(&self, neighborhood: &str) -> Result<Vec<Restaurant>> {
        self.fetch_by_cuisine_and_neighborhood(ALL_FILTER, neighborhood)
            .await
    }

    pub async fn fetch_by_cuisine_and_neighborhood(
        &self,
        cuisine: &str,
        neighborhood: &str,
    ) -> Result<Vec<Restaurant>> {
        let restaurants = self.fetch_restaurants(false).await?;
        Ok(filter_restaurants(restaurants, cuisine, neighborhood))
    }

    /// Distinct cuisines in first-seen order.
    pub async fn fetch_cuisines(&self) -> Result<Vec<String>> {
        let restaurants = self.fetch_restaurants(false).await?;
        Ok(unique_in_order(
            restaurants.iter().map(|restaurant| restaurant.cuisine_type.as_str()),
        ))
    }

    /// Distinct neighborhoods in first-seen order.
    pub async fn fetch_neighborhoods(&self) -> Result<Vec<String>> {
        let restaurants = self.fetch_restaurants(false).await?;
        Ok(unique_in_order(
            restaurants.iter().map(|restaurant| restaurant.neighborhood.as_str()),
        ))
    }
}
