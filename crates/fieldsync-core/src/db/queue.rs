//! Mutation queue repository

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::models::{QueueId, QueueItem, QueuedOperation};

/// `SQLite` access to the `queue_items` of one operation family.
///
/// Items are returned in enqueue order (`seq`), which is also replay order.
pub struct SqliteQueueRepository<'a> {
    conn: &'a Connection,
}

struct QueueRow {
    queue_id: String,
    priority: String,
    payload: String,
    enqueued_at: i64,
}

impl<'a> SqliteQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append `item` to the tail of its family's queue
    pub fn push<O: QueuedOperation>(&self, item: &QueueItem<O>) -> Result<()> {
        let payload = serde_json::to_string(&item.operation)?;
        self.conn.execute(
            "INSERT INTO queue_items (queue_id, family, operation, priority, payload, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id.as_str(),
                O::FAMILY.as_str(),
                item.operation_type().as_str(),
                item.priority.as_str(),
                payload,
                item.enqueued_at
            ],
        )?;
        Ok(())
    }

    pub fn list<O: QueuedOperation>(&self) -> Result<Vec<QueueItem<O>>> {
        let mut stmt = self.conn.prepare(
            "SELECT queue_id, priority, payload, enqueued_at FROM queue_items
             WHERE family = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![O::FAMILY.as_str()], Self::parse_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(decode_item(row?)?);
        }
        Ok(items)
    }

    pub fn get<O: QueuedOperation>(&self, id: &QueueId) -> Result<Option<QueueItem<O>>> {
        let row = self
            .conn
            .query_row(
                "SELECT queue_id, priority, payload, enqueued_at FROM queue_items
                 WHERE family = ?1 AND queue_id = ?2",
                params![O::FAMILY.as_str(), id.as_str()],
                Self::parse_row,
            )
            .optional()?;
        row.map(decode_item).transpose()
    }

    /// Remove one item. Returns whether it was present.
    pub fn remove<O: QueuedOperation>(&self, id: &QueueId) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM queue_items WHERE family = ?1 AND queue_id = ?2",
            params![O::FAMILY.as_str(), id.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Remove every item of the family. Returns the number removed.
    pub fn clear<O: QueuedOperation>(&self) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM queue_items WHERE family = ?1",
            params![O::FAMILY.as_str()],
        )?;
        Ok(affected)
    }

    pub fn count<O: QueuedOperation>(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM queue_items WHERE family = ?1",
            params![O::FAMILY.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Rewrite every queued operation targeting `from` to target `to`.
    ///
    /// Returns the number of items rewritten. Callers run this inside the
    /// same transaction that records the server id.
    pub fn retarget<O: QueuedOperation>(&self, from: &str, to: &str) -> Result<usize> {
        let mut rewritten = 0;
        for mut item in self.list::<O>()? {
            if item.operation.retarget(from, to) {
                let payload = serde_json::to_string(&item.operation)?;
                self.conn.execute(
                    "UPDATE queue_items SET payload = ?1 WHERE queue_id = ?2",
                    params![payload, item.id.as_str()],
                )?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    fn parse_row(row: &Row<'_>) -> rusqlite::Result<QueueRow> {
        Ok(QueueRow {
            queue_id: row.get(0)?,
            priority: row.get(1)?,
            payload: row.get(2)?,
            enqueued_at: row.get(3)?,
        })
    }
}

fn decode_item<O: QueuedOperation>(row: QueueRow) -> Result<QueueItem<O>> {
    let id = row
        .queue_id
        .parse()
        .map_err(|error| Error::Cache(format!("invalid queue id '{}': {error}", row.queue_id)))?;
    let priority = row.priority.parse().map_err(Error::Cache)?;
    let operation = serde_json::from_str(&row.payload).map_err(|error| {
        Error::Cache(format!(
            "unreadable {} queue item '{}': {error}",
            O::FAMILY,
            row.queue_id
        ))
    })?;

    Ok(QueueItem {
        id,
        operation,
        priority,
        enqueued_at: row.enqueued_at,
    })
}
