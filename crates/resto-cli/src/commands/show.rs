use resto_core::{ReadApi, RestaurantId, SyncContext};

use crate::commands::common::format_review_lines;
use crate::error::CliError;

pub async fn run_show(context: &SyncContext, id: i64, as_json: bool) -> Result<(), CliError> {
    let detail = ReadApi::new(context.clone())
        .fetch_restaurant_by_id(RestaurantId::new(id))
        .await?
        .ok_or(CliError::RestaurantNotFound(id))?;

    if as_json {
        let value = serde_json::json!({
            "restaurant": detail.restaurant,
            "reviews": detail.reviews,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let restaurant = &detail.restaurant;
    let favorite = if restaurant.is_favorite {
        "  (favorite)"
    } else {
        ""
    };
    println!("{}{favorite}", restaurant.name);
    println!("{} in {}", restaurant.cuisine_type, restaurant.neighborhood);
    if !restaurant.address.is_empty() {
        println!("{}", restaurant.address);
    }
    println!("Photo: {}", restaurant.image_file_name(None));
    for (day, hours) in &restaurant.operating_hours {
        println!("  {day:<10} {hours}");
    }

    println!();
    if detail.reviews.is_empty() {
        println!("No reviews yet.");
    } else {
        for line in format_review_lines(&detail.reviews) {
            println!("{line}");
        }
    }
    Ok(())
}
