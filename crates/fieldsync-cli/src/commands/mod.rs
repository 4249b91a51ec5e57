pub mod common;
pub mod config;
pub mod events;
pub mod notifications;
pub mod queue;
pub mod sync;
