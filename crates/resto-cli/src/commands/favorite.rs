use resto_core::{EditApi, Error, RestaurantId, SyncContext};

use crate::error::CliError;

pub async fn run_favorite(context: &SyncContext, id: i64) -> Result<(), CliError> {
    let restaurant = match EditApi::new(context.clone())
        .toggle_favorite(RestaurantId::new(id))
        .await
    {
        Ok(restaurant) => restaurant,
        Err(Error::RecordNotFound { .. }) => return Err(CliError::RestaurantNotFound(id)),
        Err(error) => return Err(error.into()),
    };

    if restaurant.is_favorite {
        println!("Marked {} as favorite", restaurant.name);
    } else {
        println!("Removed {} from favorites", restaurant.name);
    }
    Ok(())
}
