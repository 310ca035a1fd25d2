//! Reconciliation engine for LinkVault.
//!
//! Owns the client-visible ordered bookmark collection for the current user
//! and keeps it consistent by merging local optimistic mutations with the
//! remote change feed. The engine has two coarse states: unauthenticated
//! (empty collection, no subscription) and authenticated (populated
//! collection, one active subscription), with transitions driven solely by
//! session changes.

use tracing::{debug, info, warn};
use url::Url;

use crate::backend::feed::FeedSubscription;
use crate::backend::{BookmarkStore, ChangeFeed};
use crate::types::errors::{EngineError, ValidationError};
use crate::types::{Bookmark, ChangeEvent, NewBookmark, Session};

/// Trims and validates bookmark input before any remote call is made.
///
/// Returns the trimmed `(title, url)` pair on success. The URL must parse as
/// an absolute URL; relative references are rejected.
pub fn validate_input(title: &str, url: &str) -> Result<(String, String), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if Url::parse(url).is_err() {
        return Err(ValidationError::InvalidUrl(url.to_string()));
    }

    Ok((title.to_string(), url.to_string()))
}

/// Applies one change feed event to a collection, maintaining the
/// creation-time-descending order invariant.
///
/// A pure per-identifier reducer: insert de-duplicates by identifier (the
/// local optimistic copy or a duplicate delivery of the same event wins
/// once), update replaces in place and never inserts, delete removes and
/// tolerates absence. No cross-identifier ordering is assumed.
pub fn apply_event(collection: &mut Vec<Bookmark>, event: ChangeEvent) {
    match event {
        ChangeEvent::Insert { after } => {
            if collection.iter().any(|b| b.id == after.id) {
                return;
            }
            // Head placement, then a stable sort: equal timestamps keep the
            // newest arrival first.
            collection.insert(0, after);
            sort_newest_first(collection);
        }
        ChangeEvent::Update { after } => {
            if let Some(slot) = collection.iter_mut().find(|b| b.id == after.id) {
                *slot = after;
                sort_newest_first(collection);
            }
        }
        ChangeEvent::Delete { id } => {
            collection.retain(|b| b.id != id);
        }
    }
}

fn sort_newest_first(collection: &mut [Bookmark]) {
    collection.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Reconciliation engine over a persistent store and a change feed.
///
/// All mutations to the collection happen through discrete method calls
/// (user-action handlers and the feed pump), so the engine needs no internal
/// locking under a cooperatively scheduled runtime.
pub struct SyncEngine<S, F> {
    store: S,
    feed: F,
    session: Option<Session>,
    bookmarks: Vec<Bookmark>,
    subscription: Option<FeedSubscription>,
    last_error: Option<EngineError>,
    loading: bool,
    // Bumped on every session transition; an in-flight fetch carries the
    // generation it was issued under and its result is discarded when a newer
    // transition superseded it.
    generation: u64,
}

impl<S: BookmarkStore, F: ChangeFeed> SyncEngine<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        Self {
            store,
            feed,
            session: None,
            bookmarks: Vec::new(),
            subscription: None,
            last_error: None,
            loading: false,
            generation: 0,
        }
    }

    /// Read-only snapshot of the current collection, newest first.
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The last error surfaced at the engine boundary, if the most recent
    /// action failed. Overwritten (or cleared) by the next action.
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Establishes engine state for a session.
    ///
    /// Any existing subscription is torn down before anything else so a
    /// previous user's events can never bleed into the new collection. With
    /// no session the collection is cleared; with one, the owner's rows are
    /// fetched newest-first and a feed subscription is opened for the owner.
    pub async fn initialize(&mut self, session: Option<Session>) -> Result<(), EngineError> {
        self.teardown();
        self.generation += 1;
        let generation = self.generation;
        self.last_error = None;
        self.session = session.clone();

        let Some(session) = session else {
            self.bookmarks.clear();
            self.loading = false;
            info!("initialized without session");
            return Ok(());
        };

        self.loading = true;
        let fetched = self.store.query_by_owner(&session.user_id).await;

        if generation != self.generation {
            // A newer session transition superseded this fetch.
            debug!(user = %session.user_id, "discarding superseded fetch");
            return Ok(());
        }
        self.loading = false;

        match fetched {
            Ok(mut rows) => {
                sort_newest_first(&mut rows);
                self.bookmarks = rows;
            }
            Err(e) => {
                // Never leave a previous user's rows on display behind a
                // failed fetch; an empty collection plus the error is the
                // only state that cannot leak.
                self.bookmarks.clear();
                warn!(user = %session.user_id, error = %e, "initial fetch failed");
                return Err(self.fail(EngineError::RemoteRead(e.to_string())));
            }
        }

        match self.feed.subscribe(&session.user_id).await {
            Ok(subscription) => {
                if generation == self.generation {
                    self.subscription = Some(subscription);
                }
                info!(
                    user = %session.user_id,
                    bookmarks = self.bookmarks.len(),
                    "initialized session"
                );
                Ok(())
            }
            Err(e) => {
                // The collection stays populated from the fetch but receives
                // no live updates until a later session transition.
                warn!(user = %session.user_id, error = %e, "feed subscription failed");
                Err(self.fail(EngineError::Subscription(e.to_string())))
            }
        }
    }

    /// Reacts to a login, logout, or token refresh pushed by the session
    /// provider. Teardown-before-setup ordering is enforced by `initialize`.
    pub async fn on_session_change(
        &mut self,
        new_session: Option<Session>,
    ) -> Result<(), EngineError> {
        self.initialize(new_session).await
    }

    /// Merges one remote change feed event into the collection.
    pub fn apply_remote_event(&mut self, event: ChangeEvent) {
        debug!(kind = event.kind(), id = event.record_id(), "applying feed event");
        apply_event(&mut self.bookmarks, event);
    }

    /// Drains all pending subscription events into the collection. Returns
    /// the number of events applied.
    pub fn process_feed_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.as_mut().and_then(FeedSubscription::try_next) {
            self.apply_remote_event(event);
            applied += 1;
        }
        applied
    }

    /// Creates a bookmark for the current user.
    ///
    /// Input is validated before any remote call. On success the engine does
    /// not touch the collection; the authoritative copy arrives through the
    /// change feed, and the insert reducer de-duplicates either way.
    pub async fn add_bookmark(&mut self, title: &str, url: &str) -> Result<(), EngineError> {
        self.last_error = None;

        let Some(session) = self.session.clone() else {
            return Err(self.fail(EngineError::NotAuthenticated));
        };
        let (title, url) = match validate_input(title, url) {
            Ok(trimmed) => trimmed,
            Err(e) => return Err(self.fail(EngineError::Validation(e))),
        };

        let new = NewBookmark {
            title,
            url,
            user_id: session.user_id,
        };
        match self.store.insert(new).await {
            Ok(created) => {
                debug!(id = %created.id, "bookmark created remotely");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "bookmark insert failed");
                Err(self.fail(EngineError::RemoteWrite(e.to_string())))
            }
        }
    }

    /// Deletes a bookmark, removing it locally before the remote confirms.
    ///
    /// On remote failure the engine does not try to reconstruct the removed
    /// row; it reloads the authoritative collection, which restores the
    /// record if the delete never landed, then surfaces the write error.
    pub async fn delete_bookmark(&mut self, id: &str) -> Result<(), EngineError> {
        self.last_error = None;

        self.bookmarks.retain(|b| b.id != id);

        if let Err(e) = self.store.delete_by_id(id).await {
            warn!(id, error = %e, "bookmark delete failed, reloading");
            let _ = self.reload().await;
            return Err(self.fail(EngineError::RemoteWrite(e.to_string())));
        }
        Ok(())
    }

    /// Releases the feed subscription. Deregistration is synchronous, so no
    /// event is observable after this returns.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Replaces the collection with the store's authoritative contents for
    /// the current session. A same-session resync: on failure the collection
    /// is left at its prior state.
    async fn reload(&mut self) -> Result<(), EngineError> {
        let Some(session) = self.session.clone() else {
            return Ok(());
        };
        let generation = self.generation;

        match self.store.query_by_owner(&session.user_id).await {
            Ok(mut rows) => {
                if generation == self.generation {
                    sort_newest_first(&mut rows);
                    self.bookmarks = rows;
                }
                Ok(())
            }
            Err(e) => {
                warn!(user = %session.user_id, error = %e, "reload failed");
                Err(self.fail(EngineError::RemoteRead(e.to_string())))
            }
        }
    }

    fn fail(&mut self, error: EngineError) -> EngineError {
        self.last_error = Some(error.clone());
        error
    }
}
