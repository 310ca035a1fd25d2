//! SQLite connection management for LinkVault.
//!
//! [`Database`] wraps a `rusqlite::Connection` and runs the schema migrations
//! on open. The schema mirrors the hosted bookmarks table: one row per
//! bookmark, keyed by identifier, indexed by owner and creation time.

use rusqlite::Connection;
use std::path::Path;

/// Idempotent schema statements, executed in order on every open.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS bookmarks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_bookmarks_owner ON bookmarks(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_bookmarks_owner_created
        ON bookmarks(user_id, created_at DESC)",
];

/// Database wrapper owning the SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) a SQLite database at the given path and runs
    /// migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Opens an in-memory database and runs migrations. The data is discarded
    /// when the `Database` is dropped; useful for tests.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<(), rusqlite::Error> {
        for statement in MIGRATIONS {
            self.conn.execute(statement, [])?;
        }
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
