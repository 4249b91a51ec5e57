//! Preference repository implementation

use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::EntityFamily;

/// `SQLite` access to the per-family `preferences` key/value table
pub struct SqlitePreferenceRepository<'a> {
    conn: &'a Connection,
    family: EntityFamily,
}

impl<'a> SqlitePreferenceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection, family: EntityFamily) -> Self {
        Self { conn, family }
    }

    /// Load every stored preference of the family
    pub fn load<T: DeserializeOwned>(&self) -> Result<BTreeMap<String, T>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM preferences WHERE family = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![self.family.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut preferences = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            let parsed = serde_json::from_str(&value).map_err(|error| {
                Error::Cache(format!(
                    "unreadable {} preference '{key}': {error}",
                    self.family
                ))
            })?;
            preferences.insert(key, parsed);
        }
        Ok(preferences)
    }

    /// Set one preference
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO preferences (family, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(family, key) DO UPDATE SET value = excluded.value",
            params![self.family.as_str(), key, value],
        )?;
        Ok(())
    }

    /// Merge `preferences` over the stored ones
    pub fn save_all<T: Serialize>(&self, preferences: &BTreeMap<String, T>) -> Result<()> {
        for (key, value) in preferences {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Replace the stored preferences of the family with exactly `preferences`
    pub fn replace_all<T: Serialize>(&self, preferences: &BTreeMap<String, T>) -> Result<()> {
        self.conn.execute(
            "DELETE FROM preferences WHERE family = ?1",
            params![self.family.as_str()],
        )?;
        self.save_all(preferences)
    }
}
