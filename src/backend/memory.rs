//! In-memory backend: store, change feed, and session provider doubles.
//!
//! Used by the engine test suite and as a stand-in for the hosted platform.
//! The store supports one-shot failure injection so the delete-then-reload
//! and subscription-failure paths can be exercised deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::feed::{FeedHub, FeedSubscription};
use super::{BookmarkStore, ChangeFeed, SessionProvider};
use crate::types::errors::{StoreError, SubscriptionError};
use crate::types::{Bookmark, ChangeEvent, NewBookmark, Session};

#[derive(Default)]
struct FailureInjection {
    query: bool,
    insert: bool,
    delete: bool,
    subscribe: bool,
}

struct MemoryInner {
    rows: Mutex<HashMap<String, Bookmark>>,
    feed: Arc<FeedHub>,
    failures: Mutex<FailureInjection>,
    query_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// In-memory bookmark store and change feed.
///
/// Cloning yields handles to the same shared state, so a test can keep one
/// handle for seeding and assertions while the engine owns another.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                rows: Mutex::new(HashMap::new()),
                feed: FeedHub::new(),
                failures: Mutex::new(FailureInjection::default()),
                query_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
            }),
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn lock_rows(&self) -> MutexGuard<'_, HashMap<String, Bookmark>> {
        self.inner
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_failures(&self) -> MutexGuard<'_, FailureInjection> {
        self.inner
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The hub this backend publishes mutation events to.
    pub fn feed(&self) -> Arc<FeedHub> {
        Arc::clone(&self.inner.feed)
    }

    /// Inserts a row directly, without publishing a feed event. For seeding
    /// pre-existing remote state in tests.
    pub fn seed(&self, bookmark: Bookmark) {
        self.lock_rows().insert(bookmark.id.clone(), bookmark);
    }

    /// Number of rows currently stored, across all owners.
    pub fn row_count(&self) -> usize {
        self.lock_rows().len()
    }

    /// Whether a row with the given identifier exists.
    pub fn contains(&self, id: &str) -> bool {
        self.lock_rows().contains_key(id)
    }

    pub fn query_calls(&self) -> usize {
        self.inner.query_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.inner.insert_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `query_by_owner` fail with a network error.
    pub fn inject_query_failure(&self) {
        self.lock_failures().query = true;
    }

    /// Makes the next `insert` fail with a network error.
    pub fn inject_insert_failure(&self) {
        self.lock_failures().insert = true;
    }

    /// Makes the next `delete_by_id` fail with a network error.
    pub fn inject_delete_failure(&self) {
        self.lock_failures().delete = true;
    }

    /// Makes the next `subscribe` fail.
    pub fn inject_subscribe_failure(&self) {
        self.lock_failures().subscribe = true;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkStore for MemoryBackend {
    async fn query_by_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError> {
        self.inner.query_calls.fetch_add(1, Ordering::SeqCst);
        if std::mem::take(&mut self.lock_failures().query) {
            return Err(StoreError::Network("injected query failure".to_string()));
        }

        let mut rows: Vec<Bookmark> = self
            .lock_rows()
            .values()
            .filter(|b| b.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, new: NewBookmark) -> Result<Bookmark, StoreError> {
        self.inner.insert_calls.fetch_add(1, Ordering::SeqCst);
        if std::mem::take(&mut self.lock_failures().insert) {
            return Err(StoreError::Network("injected insert failure".to_string()));
        }

        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            url: new.url,
            user_id: new.user_id,
            created_at: Self::now(),
        };
        self.lock_rows()
            .insert(bookmark.id.clone(), bookmark.clone());
        self.inner.feed.publish(
            &bookmark.user_id,
            ChangeEvent::Insert {
                after: bookmark.clone(),
            },
        );
        Ok(bookmark)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_calls.fetch_add(1, Ordering::SeqCst);
        if std::mem::take(&mut self.lock_failures().delete) {
            return Err(StoreError::Network("injected delete failure".to_string()));
        }

        let removed = self.lock_rows().remove(id);
        if let Some(bookmark) = removed {
            self.inner.feed.publish(
                &bookmark.user_id,
                ChangeEvent::Delete {
                    id: bookmark.id.clone(),
                },
            );
        }
        Ok(())
    }
}

impl ChangeFeed for MemoryBackend {
    async fn subscribe(&self, owner: &str) -> Result<FeedSubscription, SubscriptionError> {
        if std::mem::take(&mut self.lock_failures().subscribe) {
            return Err(SubscriptionError::SetupFailed(
                "injected subscribe failure".to_string(),
            ));
        }
        Ok(self.inner.feed.subscribe(owner))
    }
}

struct SessionsInner {
    current: Mutex<Option<Session>>,
    watchers: Mutex<Vec<UnboundedSender<Option<Session>>>>,
}

/// In-memory session provider with explicit sign-in/sign-out.
#[derive(Clone)]
pub struct MemorySessions {
    inner: Arc<SessionsInner>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionsInner {
                current: Mutex::new(None),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Establishes a session for the given user and notifies watchers.
    pub fn sign_in(&self, user_id: &str, email: Option<&str>) -> Session {
        let session = match email {
            Some(email) => Session::with_email(user_id, email),
            None => Session::new(user_id),
        };
        *self.lock_current() = Some(session.clone());
        self.notify(Some(session.clone()));
        session
    }

    /// Clears the current session and notifies watchers.
    pub fn sign_out(&self) {
        *self.lock_current() = None;
        self.notify(None);
    }

    fn notify(&self, session: Option<Session>) {
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|w| w.send(session.clone()).is_ok());
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemorySessions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider for MemorySessions {
    fn current_session(&self) -> Option<Session> {
        self.lock_current().clone()
    }

    fn session_changes(&self) -> UnboundedReceiver<Option<Session>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        receiver
    }
}
