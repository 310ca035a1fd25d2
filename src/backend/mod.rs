//! External collaborator contracts for LinkVault.
//!
//! The engine only ever talks to the session provider, the persistent store,
//! and the change feed through these traits. Production deployments bind them
//! to a hosted platform; this crate ships a SQLite store for local use and an
//! in-memory backend for tests.

use tokio::sync::mpsc::UnboundedReceiver;

use crate::types::errors::{StoreError, SubscriptionError};
use crate::types::{Bookmark, NewBookmark, Session};

pub mod feed;
pub mod memory;
pub mod sqlite;

pub use feed::{FeedHub, FeedSubscription};
pub use memory::{MemoryBackend, MemorySessions};
pub use sqlite::SqliteStore;

/// Identity provider contract.
///
/// `session_changes` pushes a full session snapshot (or `None` on logout) on
/// every login, logout, or token refresh. Sign-in flows are provider-specific
/// and live on the concrete implementations.
pub trait SessionProvider {
    /// One-shot query for the current session.
    fn current_session(&self) -> Option<Session>;

    /// Channel of session snapshots pushed on every session transition.
    fn session_changes(&self) -> UnboundedReceiver<Option<Session>>;
}

/// Persistent store contract: a table of bookmark rows keyed by identifier,
/// with row-level access restricted to the owning user.
#[allow(async_fn_in_trait)]
pub trait BookmarkStore {
    /// Fetches all rows owned by `owner`, ordered by creation time descending.
    async fn query_by_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError>;

    /// Inserts a new row. The store assigns the identifier and creation
    /// timestamp and returns the committed record.
    async fn insert(&self, new: NewBookmark) -> Result<Bookmark, StoreError>;

    /// Deletes the row with the given identifier. Deleting an absent row is
    /// not an error.
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
}

/// Change feed contract: a subscribable stream of row-level mutation events
/// filtered server-side by owner.
#[allow(async_fn_in_trait)]
pub trait ChangeFeed {
    /// Opens a subscription delivering events for rows owned by `owner`.
    ///
    /// Dropping the returned subscription (or calling
    /// [`FeedSubscription::unsubscribe`]) synchronously removes the client
    /// from the routing table; no event is observable afterwards.
    async fn subscribe(&self, owner: &str) -> Result<FeedSubscription, SubscriptionError>;
}
