use fieldsync_core::models::{NotificationDraft, NotificationFilters, NotificationPreferences};

use crate::cli::{NotificationCommands, PrefsCommands};
use crate::commands::common::{
    format_notification_lines, format_timestamp, print_json, CommandContext, Notifications,
};
use crate::error::CliError;

pub async fn run_notifications(
    command: NotificationCommands,
    context: &CommandContext,
) -> Result<(), CliError> {
    let engine = context.engine().await?;
    let repo = engine.notifications();

    match command {
        NotificationCommands::List {
            status,
            notification_type,
            priority,
            unread,
            limit,
            json,
        } => {
            let filters = NotificationFilters {
                status,
                notification_type,
                priority,
                unread_only: unread,
                limit,
            };
            run_list(&repo, &filters, json).await
        }
        NotificationCommands::Show { id, json } => run_show(&repo, &id, json).await,
        NotificationCommands::Create {
            title,
            body,
            notification_type,
            priority,
        } => {
            let mut draft = NotificationDraft::new(title);
            draft.body = body;
            if let Some(notification_type) = notification_type {
                draft.notification_type = notification_type;
            }
            if let Some(priority) = priority {
                draft.priority = priority;
            }
            let created = repo.create(draft).await?;
            println!("Created notification {}", created.id);
            Ok(())
        }
        NotificationCommands::Read { id } => {
            let updated = repo.mark_as_read(&id).await?;
            println!("Marked {} as read", updated.id);
            Ok(())
        }
        NotificationCommands::Dismiss { id } => {
            let updated = repo.mark_as_dismissed(&id).await?;
            println!("Dismissed {}", updated.id);
            Ok(())
        }
        NotificationCommands::ReadAll => {
            let count = repo.mark_all_as_read().await?;
            println!("Marked {count} notification(s) as read");
            Ok(())
        }
        NotificationCommands::Clear => {
            let count = repo.clear_all().await?;
            println!("Cleared {count} notification(s)");
            Ok(())
        }
        NotificationCommands::Summary { json } => run_summary(&repo, json).await,
        NotificationCommands::Prefs { command } => run_prefs(&repo, command).await,
        NotificationCommands::Subscribe { topic } => {
            repo.subscribe(&topic).await?;
            println!("Subscribed to {topic}");
            Ok(())
        }
        NotificationCommands::Unsubscribe { topic } => {
            repo.unsubscribe(&topic).await?;
            println!("Unsubscribed from {topic}");
            Ok(())
        }
    }
}

async fn run_list(
    repo: &Notifications,
    filters: &NotificationFilters,
    as_json: bool,
) -> Result<(), CliError> {
    let notifications = repo.list(filters).await?;

    if as_json {
        return print_json(&notifications);
    }
    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    for line in format_notification_lines(&notifications) {
        println!("{line}");
    }
    Ok(())
}

async fn run_show(repo: &Notifications, id: &str, as_json: bool) -> Result<(), CliError> {
    let notification = repo.get_by_id(id).await?;
    if as_json {
        return print_json(&notification);
    }

    println!("{}", notification.title);
    if !notification.body.is_empty() {
        println!();
        println!("{}", notification.body);
        println!();
    }
    println!("id:       {}", notification.id);
    println!("type:     {}", notification.notification_type);
    println!("priority: {}", notification.priority.as_str());
    println!("status:   {}", notification.status.as_str());
    println!("created:  {}", format_timestamp(notification.created_at));
    if let Some(read_at) = notification.read_at {
        println!("read:     {}", format_timestamp(read_at));
    }
    Ok(())
}

async fn run_summary(repo: &Notifications, as_json: bool) -> Result<(), CliError> {
    let summary = repo.get_summary().await?;
    if as_json {
        return print_json(&summary);
    }

    println!(
        "{} total, {} unread, {} read, {} dismissed",
        summary.total, summary.unread, summary.read, summary.dismissed
    );
    for (notification_type, count) in &summary.by_type {
        println!("  {notification_type:<10} {count}");
    }
    Ok(())
}

async fn run_prefs(repo: &Notifications, command: Option<PrefsCommands>) -> Result<(), CliError> {
    let preferences = match command {
        None => repo.get_preferences().await?,
        Some(PrefsCommands::Set { assignments }) => {
            let changes = parse_preference_assignments(&assignments)?;
            repo.update_preferences(changes).await?
        }
    };

    for (notification_type, enabled) in &preferences {
        let state = if *enabled { "on" } else { "off" };
        println!("{notification_type:<10} {state}");
    }
    Ok(())
}

/// Parse `type=bool` pairs. Unknown types are kept; the remote decides.
pub fn parse_preference_assignments(
    assignments: &[String],
) -> Result<NotificationPreferences, CliError> {
    let mut preferences = NotificationPreferences::new();
    for assignment in assignments {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            CliError::InvalidArgument(format!("expected TYPE=BOOL, got '{assignment}'"))
        })?;
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "missing preference name in '{assignment}'"
            )));
        }
        let enabled = match value.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => true,
            "false" | "off" | "no" | "0" => false,
            other => {
                return Err(CliError::InvalidArgument(format!(
                    "'{other}' is not a boolean for preference '{key}'"
                )))
            }
        };
        preferences.insert(key, enabled);
    }
    Ok(preferences)
}
