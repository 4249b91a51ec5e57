use std::path::Path;

use chrono::{DateTime, Utc};
use fieldsync_core::models::{CalendarEvent, EventDraft, EventFilters, ExportFormat, TimeRange};

use crate::cli::{self, EventCommands};
use crate::commands::common::{
    format_event_lines, format_timestamp, print_json, Calendar, CommandContext,
};
use crate::error::CliError;

pub async fn run_events(command: EventCommands, context: &CommandContext) -> Result<(), CliError> {
    let engine = context.engine().await?;
    let repo = engine.calendar();

    match command {
        EventCommands::List {
            from,
            to,
            status,
            limit,
            json,
        } => {
            let range = match (from, to) {
                (Some(from), Some(to)) => Some(TimeRange::new(from, to)?),
                _ => None,
            };
            let filters = EventFilters {
                status,
                range,
                limit,
            };
            run_list(&repo, &filters, json).await
        }
        EventCommands::Show { id, json } => run_show(&repo, &id, json).await,
        EventCommands::Create {
            title,
            start,
            end,
            location,
            description,
            all_day,
        } => {
            let mut draft = EventDraft::new(title, start, end);
            draft.location = location;
            draft.description = description;
            draft.all_day = all_day;

            let scheduled = repo.create(draft).await?;
            println!("Created event {}", scheduled.event.id);
            print_conflict_warning(&scheduled.conflicts);
            Ok(())
        }
        EventCommands::UpdateStatus { id, status } => {
            let updated = repo.update_status(&id, status).await?;
            println!("Event {} is now {}", updated.id, updated.status.as_str());
            Ok(())
        }
        EventCommands::Delete { id } => {
            repo.delete(&id).await?;
            println!("Deleted event {id}");
            Ok(())
        }
        EventCommands::Conflicts {
            start,
            end,
            exclude,
            json,
        } => run_conflicts(&repo, start, end, exclude.as_deref(), json).await,
        EventCommands::Export {
            start,
            end,
            format,
            output,
        } => run_export(&repo, start, end, format, output.as_deref()).await,
    }
}

async fn run_list(repo: &Calendar, filters: &EventFilters, as_json: bool) -> Result<(), CliError> {
    let events = repo.list(filters).await?;

    if as_json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }
    for line in format_event_lines(&events) {
        println!("{line}");
    }
    Ok(())
}

async fn run_show(repo: &Calendar, id: &str, as_json: bool) -> Result<(), CliError> {
    let event = repo.get_by_id(id).await?;
    if as_json {
        return print_json(&event);
    }

    println!("{}", event.title);
    println!("id:       {}", event.id);
    println!("status:   {}", event.status.as_str());
    println!("start:    {}", event.start.format("%Y-%m-%d %H:%M UTC"));
    println!("end:      {}", event.effective_end().format("%Y-%m-%d %H:%M UTC"));
    if event.all_day {
        println!("all day:  yes");
    }
    if let Some(location) = &event.location {
        println!("location: {location}");
    }
    if let Some(description) = &event.description {
        println!();
        println!("{description}");
        println!();
    }
    println!("updated:  {}", format_timestamp(event.updated_at));
    Ok(())
}

async fn run_conflicts(
    repo: &Calendar,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let range = TimeRange::new(start, end)?;
    let conflicts = repo.check_conflicts(&range, exclude).await?;

    if as_json {
        return print_json(&conflicts);
    }
    if conflicts.is_empty() {
        println!("No conflicting events.");
        return Ok(());
    }
    for line in format_event_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

async fn run_export(
    repo: &Calendar,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    format: cli::ExportFormat,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let range = TimeRange::new(start, end)?;
    let rendered = repo.export_events(&range, export_format(format)).await?;

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, rendered.as_bytes())?;
        println!("Exported events to {}", path.display());
    } else {
        print!("{rendered}");
        if !rendered.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

pub const fn export_format(format: cli::ExportFormat) -> ExportFormat {
    match format {
        cli::ExportFormat::Ical => ExportFormat::Ical,
        cli::ExportFormat::Json => ExportFormat::Json,
    }
}

fn print_conflict_warning(conflicts: &[CalendarEvent]) {
    if conflicts.is_empty() {
        return;
    }
    println!("Warning: overlaps {} existing event(s):", conflicts.len());
    for line in format_event_lines(conflicts) {
        println!("  {line}");
    }
}
