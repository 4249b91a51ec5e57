//! Entity snapshot repository

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::CachedEntity;

/// `SQLite` access to the `cache_entries` collection of one entity family.
///
/// Works against a plain connection or an open transaction.
pub struct SqliteCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace the snapshot of `entity`
    pub fn put<E: CachedEntity>(&self, entity: &E) -> Result<()> {
        let snapshot = serde_json::to_string(entity)?;
        self.conn.execute(
            "INSERT INTO cache_entries (family, id, snapshot, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(family, id) DO UPDATE SET
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at",
            params![
                E::FAMILY.as_str(),
                entity.id(),
                snapshot,
                entity.updated_at()
            ],
        )?;
        Ok(())
    }

    pub fn get<E: CachedEntity>(&self, id: &str) -> Result<Option<E>> {
        let snapshot: Option<String> = self
            .conn
            .query_row(
                "SELECT snapshot FROM cache_entries WHERE family = ?1 AND id = ?2",
                params![E::FAMILY.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        snapshot
            .map(|snapshot| decode_snapshot::<E>(id, &snapshot))
            .transpose()
    }

    /// All snapshots of the family, most recently updated first
    pub fn list<E: CachedEntity>(&self) -> Result<Vec<E>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, snapshot FROM cache_entries WHERE family = ?1
             ORDER BY updated_at DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![E::FAMILY.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entities = Vec::new();
        for row in rows {
            let (id, snapshot) = row?;
            entities.push(decode_snapshot::<E>(&id, &snapshot)?);
        }
        Ok(entities)
    }

    pub fn ids<E: CachedEntity>(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM cache_entries WHERE family = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![E::FAMILY.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Remove one snapshot. Returns whether a row was deleted.
    pub fn remove<E: CachedEntity>(&self, id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM cache_entries WHERE family = ?1 AND id = ?2",
            params![E::FAMILY.as_str(), id],
        )?;
        Ok(affected > 0)
    }

    /// Remove every snapshot whose id is not in `keep`. Returns the number removed.
    pub fn retain<E: CachedEntity>(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;
        for id in self.ids::<E>()? {
            if !keep.contains(&id) && self.remove::<E>(&id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn decode_snapshot<E: CachedEntity>(id: &str, snapshot: &str) -> Result<E> {
    serde_json::from_str(snapshot).map_err(|error| {
        Error::Cache(format!(
            "unreadable {} snapshot '{id}': {error}",
            E::FAMILY
        ))
    })
}
