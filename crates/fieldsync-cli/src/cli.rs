use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use fieldsync_core::models::{
    EventStatus, NotificationPriority, NotificationStatus, NotificationType, OperationType,
    QueuePriority,
};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Offline-first notifications and calendar from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Work from the local cache and queue without probing the remote
    #[arg(long, global = true)]
    pub offline: bool,

    /// Priority for writes that end up queued for sync
    #[arg(long, global = true, value_name = "PRIORITY", default_value = "normal")]
    pub queue_priority: QueuePriority,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and manage notifications
    #[command(alias = "n")]
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },
    /// Read and manage calendar events
    #[command(alias = "e")]
    Events {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Inspect or drop writes waiting for sync
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Replay queued writes against the remote
    Sync {
        /// Only sync one entity family
        #[arg(long, value_enum)]
        family: Option<Family>,
        /// Only replay these operation types (repeatable)
        #[arg(long = "operation", value_name = "TYPE")]
        operations: Vec<OperationType>,
        /// Only replay these priorities (repeatable)
        #[arg(long = "priority", value_name = "PRIORITY")]
        priorities: Vec<QueuePriority>,
        /// Replay higher priorities first
        #[arg(long)]
        prioritized: bool,
        /// Output the sync sessions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or update the client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Family {
    Notifications,
    Calendar,
}

impl Family {
    /// Families selected by an optional `--family` flag
    pub fn selected(family: Option<Self>) -> Vec<Self> {
        family.map_or_else(|| vec![Self::Notifications, Self::Calendar], |family| vec![family])
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Ical,
    Json,
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<NotificationStatus>,
        /// Filter by type
        #[arg(long = "type", value_name = "TYPE")]
        notification_type: Option<NotificationType>,
        /// Filter by priority
        #[arg(long)]
        priority: Option<NotificationPriority>,
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
        /// Maximum number of notifications to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one notification
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a notification
    Create {
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long = "type", value_name = "TYPE")]
        notification_type: Option<NotificationType>,
        #[arg(long)]
        priority: Option<NotificationPriority>,
    },
    /// Mark a notification read
    Read { id: String },
    /// Dismiss a notification
    Dismiss { id: String },
    /// Mark every notification read
    ReadAll,
    /// Remove every notification
    Clear,
    /// Show notification counts
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or update notification preferences
    Prefs {
        #[command(subcommand)]
        command: Option<PrefsCommands>,
    },
    /// Subscribe to a topic (requires a connection)
    Subscribe { topic: String },
    /// Unsubscribe from a topic (requires a connection)
    Unsubscribe { topic: String },
}

#[derive(Subcommand)]
pub enum PrefsCommands {
    /// Set preferences, e.g. `reminder=false system=true`
    Set {
        #[arg(required = true, value_name = "TYPE=BOOL")]
        assignments: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// List events
    List {
        /// Range start (RFC 3339)
        #[arg(long, requires = "to")]
        from: Option<DateTime<Utc>>,
        /// Range end (RFC 3339)
        #[arg(long, requires = "from")]
        to: Option<DateTime<Utc>>,
        /// Filter by status
        #[arg(long)]
        status: Option<EventStatus>,
        /// Maximum number of events to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one event
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an event
    Create {
        title: String,
        /// Start time (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// End time (RFC 3339); one hour after start when omitted
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        all_day: bool,
    },
    /// Change the status of an event
    UpdateStatus { id: String, status: EventStatus },
    /// Delete an event
    Delete { id: String },
    /// Show events overlapping a time range
    Conflicts {
        /// Range start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Range end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
        /// Event to leave out of the check
        #[arg(long, value_name = "ID")]
        exclude: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export events in a time range (requires a connection)
    Export {
        /// Range start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Range end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
        #[arg(long, value_enum, default_value_t = ExportFormat::Ical)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued writes in replay order
    List {
        #[arg(long, value_enum)]
        family: Option<Family>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop queued writes without replaying them
    Clear {
        #[arg(long, value_enum)]
        family: Option<Family>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (token redacted)
    Show,
    /// Update the config file
    Set {
        /// Remote API base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Bearer token for the remote API
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Local database path
        #[arg(long = "database", value_name = "PATH")]
        database_path: Option<PathBuf>,
    },
}
