//! Database layer for Fieldsync

mod cache;
mod connection;
mod migrations;
mod preferences;
mod queue;

pub use cache::SqliteCacheRepository;
pub use connection::{is_corrupted_db_error, Database};
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use preferences::SqlitePreferenceRepository;
pub use queue::SqliteQueueRepository;
