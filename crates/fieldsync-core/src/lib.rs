//! fieldsync-core - Offline-first sync engine
//!
//! This crate contains the entity models, the local SQLite store, the durable
//! mutation queue, the remote gateway and the per-family repositories and
//! sync orchestrator used by every Fieldsync client.

pub mod config;
pub mod conflict;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod policy;
pub mod repository;
pub mod services;
pub mod sync;
pub mod util;

pub use config::ClientConfig;
pub use connectivity::{ConnectivityFlag, ConnectivityOracle};
pub use error::{Error, GatewayError, GatewayResult, Result, ServiceError};
pub use gateway::{CalendarGateway, HttpGateway, NotificationGateway};
pub use models::{CalendarEvent, EntityFamily, Notification, QueueId, QueueItem};
pub use repository::{CalendarRepository, NotificationRepository, ScheduledEvent};
pub use services::LocalStore;
pub use sync::{SyncCancelHandle, SyncFilter, SyncOrchestrator, SyncSession, SyncStatus};
