use resto_core::{Collection, ReadApi, Restaurant, SyncContext};

use crate::commands::common::{
    format_restaurant_lines, restaurant_to_list_item, RestaurantListItem,
};
use crate::error::CliError;

/// Local restaurants matching both filters, optionally refreshing the
/// restaurants and reviews from the data service first.
///
/// A failed refresh falls back to whatever the mirror already holds.
pub async fn list_restaurants(
    context: &SyncContext,
    cuisine: &str,
    neighborhood: &str,
    refresh: bool,
) -> Result<Vec<Restaurant>, CliError> {
    let api = ReadApi::new(context.clone());
    if refresh {
        for collection in [Collection::Restaurants, Collection::Reviews] {
            match api.refresh(collection).await {
                Ok(count) => tracing::debug!("Refreshed {count} {collection}"),
                Err(error) => {
                    tracing::warn!("Refresh of {collection} failed, showing local data: {error}");
                }
            }
        }
    }
    Ok(api
        .fetch_by_cuisine_and_neighborhood(cuisine, neighborhood)
        .await?)
}

pub async fn run_restaurants(
    context: &SyncContext,
    cuisine: &str,
    neighborhood: &str,
    refresh: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let restaurants = list_restaurants(context, cuisine, neighborhood, refresh).await?;

    if as_json {
        let items = restaurants
            .iter()
            .map(restaurant_to_list_item)
            .collect::<Vec<RestaurantListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if restaurants.is_empty() {
        println!("No restaurants found. Run `resto restaurants --refresh` to fetch them.");
        return Ok(());
    }

    for line in format_restaurant_lines(&restaurants) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_cuisines(context: &SyncContext) -> Result<(), CliError> {
    for cuisine in ReadApi::new(context.clone()).fetch_cuisines().await? {
        println!("{cuisine}");
    }
    Ok(())
}

pub async fn run_neighborhoods(context: &SyncContext) -> Result<(), CliError> {
    for neighborhood in ReadApi::new(context.clone()).fetch_neighborhoods().await? {
        println!("{neighborhood}");
    }
    Ok(())
}
