use resto_core::{EditApi, Error, ReadApi, RestaurantId, Review, ReviewId, SyncContext};

use crate::commands::common::{capture_editor_input, normalize_text, resolve_comments};
use crate::error::CliError;

/// Field overrides for an existing review
#[derive(Debug, Default)]
pub struct ReviewChanges {
    pub name: Option<String>,
    pub rating: Option<i32>,
    pub comments: Option<String>,
}

impl ReviewChanges {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.rating.is_none() && self.comments.is_none()
    }
}

pub async fn add_review(
    context: &SyncContext,
    restaurant_id: i64,
    name: &str,
    rating: i32,
    comments: String,
) -> Result<Review, CliError> {
    let restaurant_id = RestaurantId::new(restaurant_id);
    if ReadApi::new(context.clone())
        .fetch_restaurant_by_id(restaurant_id)
        .await?
        .is_none()
    {
        return Err(CliError::RestaurantNotFound(restaurant_id.get()));
    }

    let api = EditApi::new(context.clone());
    let mut review = api.new_review_draft(restaurant_id).await?;
    review.name = name.trim().to_string();
    review.rating = rating;
    review.comments = comments;
    Ok(api.save_review(review).await?)
}

pub async fn edit_review(
    context: &SyncContext,
    id: i64,
    changes: ReviewChanges,
) -> Result<Review, CliError> {
    let mut review = find_review(context, id).await?;
    if let Some(name) = changes.name {
        review.name = name.trim().to_string();
    }
    if let Some(rating) = changes.rating {
        review.rating = rating;
    }
    if let Some(comments) = changes.comments {
        review.comments = comments;
    }
    Ok(EditApi::new(context.clone()).save_review(review).await?)
}

pub async fn delete_review(context: &SyncContext, id: i64) -> Result<(), CliError> {
    match EditApi::new(context.clone())
        .delete_review(ReviewId::new(id))
        .await
    {
        Ok(()) => Ok(()),
        Err(Error::RecordNotFound { .. }) => Err(CliError::ReviewNotFound(id)),
        Err(error) => Err(error.into()),
    }
}

async fn find_review(context: &SyncContext, id: i64) -> Result<Review, CliError> {
    ReadApi::new(context.clone())
        .fetch_review_by_id(ReviewId::new(id))
        .await?
        .ok_or(CliError::ReviewNotFound(id))
}

pub async fn run_review_add(
    context: &SyncContext,
    restaurant_id: i64,
    name: &str,
    rating: i32,
    comment_parts: &[String],
) -> Result<(), CliError> {
    let comments = resolve_comments(comment_parts)?;
    let review = add_review(context, restaurant_id, name, rating, comments).await?;
    println!(
        "Saved review {} for restaurant {}; it will be sent on the next sync",
        review.id, review.restaurant_id
    );
    Ok(())
}

pub async fn run_review_edit(
    context: &SyncContext,
    id: i64,
    name: Option<String>,
    rating: Option<i32>,
    comment_parts: &[String],
) -> Result<(), CliError> {
    let mut changes = ReviewChanges {
        name,
        rating,
        comments: normalize_text(&comment_parts.join(" ")),
    };

    if changes.is_empty() {
        let current = find_review(context, id).await?;
        let Some(comments) = capture_editor_input(&current.comments)? else {
            return Err(CliError::EmptyComments);
        };
        if comments == current.comments {
            println!("No changes made");
            return Ok(());
        }
        changes.comments = Some(comments);
    }

    let review = edit_review(context, id, changes).await?;
    println!("Updated review {}", review.id);
    Ok(())
}

pub async fn run_review_delete(context: &SyncContext, id: i64) -> Result<(), CliError> {
    delete_review(context, id).await?;
    println!("Deleted review {id}");
    Ok(())
}
