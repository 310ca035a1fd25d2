//! SQLite-backed bookmark store.
//!
//! Implements the persistent store contract over a local SQLite database,
//! standing in for the hosted relational table. Every committed mutation is
//! published to a [`FeedHub`] so subscribed engines observe the same
//! insert/delete events a server-side change feed would deliver.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::params;
use uuid::Uuid;

use super::feed::{FeedHub, FeedSubscription};
use super::{BookmarkStore, ChangeFeed};
use crate::database::Database;
use crate::types::errors::{StoreError, SubscriptionError};
use crate::types::{Bookmark, ChangeEvent, NewBookmark};

/// Bookmark store backed by SQLite, with feed publication on mutation.
pub struct SqliteStore {
    db: Arc<Database>,
    feed: Arc<FeedHub>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            feed: FeedHub::new(),
        }
    }

    /// Creates a store publishing to an existing hub, so several stores (or a
    /// store and a test) can share one routing table.
    pub fn with_feed(db: Arc<Database>, feed: Arc<FeedHub>) -> Self {
        Self { db, feed }
    }

    /// The hub this store publishes mutation events to.
    pub fn feed(&self) -> Arc<FeedHub> {
        Arc::clone(&self.feed)
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            user_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl BookmarkStore for SqliteStore {
    async fn query_by_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, url, user_id, created_at FROM bookmarks \
                 WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![owner], Self::row_to_bookmark)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(results)
    }

    async fn insert(&self, new: NewBookmark) -> Result<Bookmark, StoreError> {
        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            url: new.url,
            user_id: new.user_id,
            created_at: Self::now(),
        };

        self.db
            .connection()
            .execute(
                "INSERT INTO bookmarks (id, title, url, user_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    bookmark.id,
                    bookmark.title,
                    bookmark.url,
                    bookmark.user_id,
                    bookmark.created_at
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        self.feed.publish(
            &bookmark.user_id,
            ChangeEvent::Insert {
                after: bookmark.clone(),
            },
        );
        Ok(bookmark)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.db.connection();

        // The owner is needed to route the delete event; fetch it first.
        let owner: Option<String> = match conn.query_row(
            "SELECT user_id FROM bookmarks WHERE id = ?1",
            params![id],
            |row| row.get(0),
        ) {
            Ok(owner) => Some(owner),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(StoreError::Database(e.to_string())),
        };

        let Some(owner) = owner else {
            // Absent row: nothing to delete, nothing to publish.
            return Ok(());
        };

        conn.execute("DELETE FROM bookmarks WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        self.feed
            .publish(&owner, ChangeEvent::Delete { id: id.to_string() });
        Ok(())
    }
}

impl ChangeFeed for SqliteStore {
    async fn subscribe(&self, owner: &str) -> Result<FeedSubscription, SubscriptionError> {
        Ok(self.feed.subscribe(owner))
    }
}
