use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fieldsync_core::models::{
    CalendarEvent, Notification, OperationType, QueueItem, QueuePriority, QueuedOperation,
};
use fieldsync_core::{
    CalendarRepository, ClientConfig, ConnectivityFlag, HttpGateway, LocalStore,
    NotificationRepository,
};
use serde::Serialize;

use crate::cli::Cli;
use crate::error::CliError;

pub type Notifications = NotificationRepository<HttpGateway, ConnectivityFlag>;
pub type Calendar = CalendarRepository<HttpGateway, ConnectivityFlag>;

/// Paths and configuration shared by every command.
#[derive(Debug)]
pub struct CommandContext {
    pub config_path: PathBuf,
    pub config: ClientConfig,
    pub db_path: PathBuf,
    pub offline: bool,
    pub queue_priority: QueuePriority,
}

impl CommandContext {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let config_path = resolve_config_path(cli.config.clone());
        let config = load_config(&config_path)?;
        let db_path = resolve_db_path(cli.db_path.clone(), &config);

        Ok(Self {
            config_path,
            config,
            db_path,
            offline: cli.offline,
            queue_priority: cli.queue_priority,
        })
    }

    pub async fn open_store(&self) -> Result<LocalStore, CliError> {
        Ok(LocalStore::open_path(&self.db_path).await?)
    }

    pub fn gateway(&self) -> Result<HttpGateway, CliError> {
        if self.config.api_base_url().is_none() {
            return Err(CliError::NotConfigured);
        }
        Ok(HttpGateway::from_config(&self.config)?)
    }

    /// Connectivity for this invocation: forced offline, or a single probe.
    pub async fn connectivity(&self, gateway: &HttpGateway) -> ConnectivityFlag {
        if self.offline {
            tracing::debug!("Offline mode requested");
            return ConnectivityFlag::offline();
        }

        let reachable = gateway.probe().await;
        if !reachable {
            tracing::info!(
                "{} is unreachable; reading from cache and queueing writes",
                gateway.base_url()
            );
        }
        ConnectivityFlag::new(reachable)
    }

    /// Open the store and the remote for commands that go through a repository.
    pub async fn engine(&self) -> Result<Engine, CliError> {
        let gateway = self.gateway()?;
        let store = self.open_store().await?;
        let connectivity = self.connectivity(&gateway).await;
        Ok(Engine {
            store,
            gateway,
            connectivity,
            priority: self.queue_priority,
        })
    }
}

pub struct Engine {
    store: LocalStore,
    gateway: HttpGateway,
    connectivity: ConnectivityFlag,
    priority: QueuePriority,
}

impl Engine {
    pub fn notifications(&self) -> Notifications {
        NotificationRepository::new(&self.store, self.gateway.clone(), self.connectivity.clone())
            .with_priority(self.priority)
    }

    pub fn calendar(&self) -> Calendar {
        CalendarRepository::new(&self.store, self.gateway.clone(), self.connectivity.clone())
            .with_priority(self.priority)
    }
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path.unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
        .join("config.json")
}

/// Read the config file and layer `FIELDSYNC_*` environment overrides on top.
pub fn load_config(path: &Path) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load_from_path(path)?;
    config.apply_env_overrides()?;
    Ok(config)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, config: &ClientConfig) -> PathBuf {
    cli_db_path
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
        .join("fieldsync.db")
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_notification_lines(notifications: &[Notification]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notifications
        .iter()
        .map(|notification| {
            let marker = if notification.is_unread() { "*" } else { " " };
            let title = preview(&notification.title, 40);
            let relative_time = format_relative_time(notification.created_at, now_ms);
            format!(
                "{marker} {:<30}  {title:<40}  {:<8}  {:<6}  {relative_time}",
                notification.id,
                notification.notification_type.as_str(),
                notification.priority.as_str(),
            )
        })
        .collect()
}

pub fn format_event_lines(events: &[CalendarEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let title = preview(&event.title, 40);
            let when = if event.all_day {
                format!("{} (all day)", event.start.format("%Y-%m-%d"))
            } else {
                format!(
                    "{} - {}",
                    event.start.format("%Y-%m-%d %H:%M"),
                    event.effective_end().format("%H:%M")
                )
            };
            format!(
                "{:<30}  {title:<40}  {when:<28}  {}",
                event.id,
                event.status.as_str()
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub id: String,
    pub family: String,
    pub operation_type: OperationType,
    pub priority: QueuePriority,
    pub target_id: Option<String>,
    pub enqueued_at: i64,
    pub relative_time: String,
}

pub fn queue_item_to_list_item<O: QueuedOperation>(item: &QueueItem<O>) -> QueueListItem {
    let now_ms = Utc::now().timestamp_millis();
    QueueListItem {
        id: item.id.as_str(),
        family: O::FAMILY.to_string(),
        operation_type: item.operation_type(),
        priority: item.priority,
        target_id: item.operation.target_id().map(ToString::to_string),
        enqueued_at: item.enqueued_at,
        relative_time: format_relative_time(item.enqueued_at, now_ms),
    }
}

pub fn format_queue_lines(items: &[QueueListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let target = item.target_id.as_deref().unwrap_or("-");
            format!(
                "{:<36}  {:<13}  {:<20}  {:<6}  {target:<30}  {}",
                item.id,
                item.family,
                item.operation_type.as_str(),
                item.priority.as_str(),
                item.relative_time
            )
        })
        .collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
