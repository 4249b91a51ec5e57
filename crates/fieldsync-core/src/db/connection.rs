//! Database connection management

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Transaction};

use super::migrations;
use crate::error::{Error, Result};

/// Database wrapper for the local `SQLite` store
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|error| classify_open_error(path, error))?;

        let mut database = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        // SQLite reads the header lazily, so corruption surfaces here
        database
            .configure()
            .and_then(|()| database.migrate())
            .map_err(|error| match error {
                Error::Database(inner) => classify_open_error(path, inner),
                other => other,
            })?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut database = Self { conn, path: None };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for durability with reasonable write throughput
    fn configure(&self) -> Result<()> {
        // In-memory databases report "memory" instead of switching to WAL
        let _mode: String = self
            .conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction, committing only if it succeeds.
    ///
    /// A failure (or a crash before commit) leaves the store in its pre-state.
    pub fn transaction<R>(&mut self, f: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Filesystem path of the database, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn classify_open_error(path: &Path, error: rusqlite::Error) -> Error {
    if is_corrupted_db_error(&error) {
        Error::Cache(format!(
            "local store at {} is corrupt: {error}",
            path.display()
        ))
    } else {
        Error::Database(error)
    }
}

/// Whether `error` indicates an unreadable or corrupt database file.
pub fn is_corrupted_db_error(error: &rusqlite::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("file is not a database") || message.contains("malformed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("fieldsync.db");

        let db = Database::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(db.path(), Some(db_path.as_path()));
    }

    #[test]
    fn test_corrupt_file_is_reported_as_cache_error() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("fieldsync.db");
        std::fs::write(&db_path, vec![0x42; 4096]).unwrap();

        let error = Database::open(&db_path).err().unwrap();
        assert!(error.is_cache_error());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO preferences (family, key, value) VALUES ('notifications', 'a', '1')",
                [],
            )?;
            Err(Error::InvalidInput("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM preferences", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
