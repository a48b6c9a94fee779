//! Database layer for the local mirror

mod collections;
mod connection;
mod meta;
mod migrations;

pub use collections::{CollectionStore, Record};
pub use connection::Database;
pub use meta::{MetaRepository, SqliteMetaRepository, LAST_LOCAL_REVIEW_ID};
pub use migrations::CURRENT_VERSION;
