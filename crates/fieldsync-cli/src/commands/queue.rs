use fieldsync_core::models::{EventOp, NotificationOp};
use fieldsync_core::LocalStore;

use crate::cli::{Family, QueueCommands};
use crate::commands::common::{
    format_queue_lines, print_json, queue_item_to_list_item, CommandContext, QueueListItem,
};
use crate::error::CliError;

/// Queue inspection works on the local store alone; no remote is needed.
pub async fn run_queue(command: QueueCommands, context: &CommandContext) -> Result<(), CliError> {
    let store = context.open_store().await?;

    match command {
        QueueCommands::List { family, json } => {
            let items = list_queued(&store, family).await?;
            if json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("Queue is empty.");
                return Ok(());
            }
            for line in format_queue_lines(&items) {
                println!("{line}");
            }
            Ok(())
        }
        QueueCommands::Clear { family } => {
            let cleared = clear_queued(&store, family).await?;
            println!("Dropped {cleared} queued write(s)");
            Ok(())
        }
    }
}

pub async fn list_queued(
    store: &LocalStore,
    family: Option<Family>,
) -> Result<Vec<QueueListItem>, CliError> {
    let mut items = Vec::new();
    for family in Family::selected(family) {
        match family {
            Family::Notifications => {
                let queued = store.queue::<NotificationOp>().list_all().await?;
                items.extend(queued.iter().map(queue_item_to_list_item));
            }
            Family::Calendar => {
                let queued = store.queue::<EventOp>().list_all().await?;
                items.extend(queued.iter().map(queue_item_to_list_item));
            }
        }
    }
    Ok(items)
}

pub async fn clear_queued(store: &LocalStore, family: Option<Family>) -> Result<usize, CliError> {
    let mut cleared = 0;
    for family in Family::selected(family) {
        cleared += match family {
            Family::Notifications => store.queue::<NotificationOp>().clear().await?,
            Family::Calendar => store.queue::<EventOp>().clear().await?,
        };
    }
    tracing::info!("Dropped {cleared} queued write(s) without replay");
    Ok(cleared)
}
