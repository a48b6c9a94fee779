pub mod common;
pub mod completions;
pub mod favorite;
pub mod restaurants;
pub mod review;
pub mod show;
pub mod sync;
