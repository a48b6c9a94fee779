use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] resto_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No review comments provided")]
    EmptyComments,
    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(i64),
    #[error("Review not found: {0}")]
    ReviewNotFound(i64),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
