//! Unit tests for the reconciliation engine.
//!
//! These tests drive `SyncEngine` through the in-memory backend, covering
//! session transitions, validation, optimistic deletion with reload recovery,
//! feed event merging, and teardown.

use linkvault::backend::{MemoryBackend, MemorySessions, SessionProvider};
use linkvault::engine::{validate_input, SyncEngine};
use linkvault::types::errors::{EngineError, ValidationError};
use linkvault::types::{Bookmark, ChangeEvent, Session};
use rstest::rstest;

fn bookmark(id: &str, title: &str, user: &str, created_at: i64) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://{}.example.com", id),
        user_id: user.to_string(),
        created_at,
    }
}

/// Helper: a fresh engine plus a handle to the same backend for seeding
/// and assertions.
fn setup() -> (MemoryBackend, SyncEngine<MemoryBackend, MemoryBackend>) {
    let backend = MemoryBackend::new();
    let engine = SyncEngine::new(backend.clone(), backend.clone());
    (backend, engine)
}

#[tokio::test]
async fn initialize_without_session_clears_state() {
    let (_backend, mut engine) = setup();

    engine.initialize(None).await.unwrap();

    assert!(engine.bookmarks().is_empty());
    assert!(!engine.is_authenticated());
    assert!(!engine.is_subscribed());
    assert!(!engine.is_loading());
}

#[tokio::test]
async fn initialize_fetches_owner_rows_newest_first() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "Older", "alice", 100));
    backend.seed(bookmark("r2", "Newer", "alice", 200));
    backend.seed(bookmark("r3", "Other user", "bob", 300));

    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    let ids: Vec<&str> = engine.bookmarks().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, ["r2", "r1"]);
    assert!(engine.is_subscribed());
}

#[tokio::test]
async fn session_change_never_mixes_users() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("a1", "Alice's", "alice", 100));
    backend.seed(bookmark("b1", "Bob's", "bob", 100));

    engine.initialize(Some(Session::new("alice"))).await.unwrap();
    engine
        .on_session_change(Some(Session::new("bob")))
        .await
        .unwrap();

    assert!(engine.bookmarks().iter().all(|b| b.user_id == "bob"));
    assert_eq!(engine.bookmarks().len(), 1);
    // Exactly one live subscription: the old one was torn down before the
    // new one was opened.
    assert_eq!(backend.feed().subscriber_count(), 1);
}

#[tokio::test]
async fn logout_clears_collection_and_subscription() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("a1", "Alice's", "alice", 100));

    engine.initialize(Some(Session::new("alice"))).await.unwrap();
    assert_eq!(engine.bookmarks().len(), 1);

    engine.on_session_change(None).await.unwrap();

    assert!(engine.bookmarks().is_empty());
    assert!(!engine.is_subscribed());
    assert_eq!(backend.feed().subscriber_count(), 0);
}

#[rstest]
#[case("", "https://a.example.com", ValidationError::EmptyTitle)]
#[case("   ", "https://a.example.com", ValidationError::EmptyTitle)]
#[case("Title", "", ValidationError::EmptyUrl)]
#[case("Title", "   ", ValidationError::EmptyUrl)]
fn rejects_blank_input(
    #[case] title: &str,
    #[case] url: &str,
    #[case] expected: ValidationError,
) {
    assert_eq!(validate_input(title, url), Err(expected));
}

#[rstest]
#[case("not-a-url")]
#[case("example.com")]
#[case("/relative/path")]
fn rejects_non_absolute_urls(#[case] url: &str) {
    assert_eq!(
        validate_input("Title", url),
        Err(ValidationError::InvalidUrl(url.to_string()))
    );
}

#[test]
fn accepts_and_trims_valid_input() {
    let (title, url) = validate_input("  My Site  ", " https://example.com/page ").unwrap();
    assert_eq!(title, "My Site");
    assert_eq!(url, "https://example.com/page");
}

#[tokio::test]
async fn add_requires_a_session() {
    let (backend, mut engine) = setup();

    let err = engine.add_bookmark("Title", "https://a.example.com").await;

    assert_eq!(err, Err(EngineError::NotAuthenticated));
    assert_eq!(backend.insert_calls(), 0);
}

#[tokio::test]
async fn add_validation_failure_makes_no_remote_call() {
    let (backend, mut engine) = setup();
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    let err = engine.add_bookmark("Bad", "not-a-url").await;

    assert!(matches!(
        err,
        Err(EngineError::Validation(ValidationError::InvalidUrl(_)))
    ));
    assert_eq!(backend.insert_calls(), 0);
    assert_eq!(backend.row_count(), 0);
    assert!(engine.last_error().is_some());
}

#[tokio::test]
async fn add_empty_input_leaves_store_and_collection_unchanged() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "Existing", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    let err = engine.add_bookmark("", "").await;

    assert!(matches!(err, Err(EngineError::Validation(_))));
    assert_eq!(backend.row_count(), 1);
    assert_eq!(engine.bookmarks().len(), 1);
}

#[tokio::test]
async fn added_bookmark_arrives_through_the_feed() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    engine
        .add_bookmark("B", "https://b.example.com")
        .await
        .unwrap();

    // No optimistic insert on add: the collection changes only once the
    // feed delivers the committed record.
    assert_eq!(engine.bookmarks().len(), 1);

    let applied = engine.process_feed_events();
    assert_eq!(applied, 1);

    let titles: Vec<&str> = engine.bookmarks().iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["B", "A"]);
    assert!(engine.bookmarks()[0].created_at >= engine.bookmarks()[1].created_at);
}

#[tokio::test]
async fn failed_insert_leaves_no_partial_state() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    backend.inject_insert_failure();
    let err = engine.add_bookmark("B", "https://b.example.com").await;

    assert!(matches!(err, Err(EngineError::RemoteWrite(_))));
    assert!(matches!(
        engine.last_error(),
        Some(EngineError::RemoteWrite(_))
    ));
    // No partial insert remains anywhere: the collection is untouched, no
    // feed event was published, and the store still holds only the seed.
    assert_eq!(engine.bookmarks().len(), 1);
    assert_eq!(engine.process_feed_events(), 0);
    assert_eq!(backend.row_count(), 1);
}

#[tokio::test]
async fn insert_event_is_idempotent() {
    let (_backend, mut engine) = setup();
    engine.initialize(Some(Session::new("alice"))).await.unwrap();
    let record = bookmark("r3", "Dup", "alice", 300);

    engine.apply_remote_event(ChangeEvent::Insert {
        after: record.clone(),
    });
    engine.apply_remote_event(ChangeEvent::Insert { after: record });

    let matching = engine.bookmarks().iter().filter(|b| b.id == "r3").count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn duplicate_feed_delivery_is_tolerated() {
    let (backend, mut engine) = setup();
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    let record = bookmark("r3", "Dup", "alice", 300);
    let event = ChangeEvent::Insert { after: record };
    backend.feed().publish("alice", event.clone());
    backend.feed().publish("alice", event);

    let applied = engine.process_feed_events();
    assert_eq!(applied, 2);
    assert_eq!(engine.bookmarks().len(), 1);
}

#[tokio::test]
async fn update_event_replaces_in_place() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "Old title", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    let mut updated = bookmark("r1", "New title", "alice", 100);
    updated.url = "https://renamed.example.com".to_string();
    engine.apply_remote_event(ChangeEvent::Update { after: updated });

    assert_eq!(engine.bookmarks().len(), 1);
    assert_eq!(engine.bookmarks()[0].title, "New title");
    assert_eq!(engine.bookmarks()[0].url, "https://renamed.example.com");
}

#[tokio::test]
async fn update_event_for_unknown_id_does_not_insert() {
    let (_backend, mut engine) = setup();
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    engine.apply_remote_event(ChangeEvent::Update {
        after: bookmark("ghost", "Ghost", "alice", 100),
    });

    assert!(engine.bookmarks().is_empty());
}

#[tokio::test]
async fn delete_event_tolerates_absence() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    engine.apply_remote_event(ChangeEvent::Delete {
        id: "r1".to_string(),
    });
    engine.apply_remote_event(ChangeEvent::Delete {
        id: "r1".to_string(),
    });

    assert!(engine.bookmarks().is_empty());
}

#[tokio::test]
async fn delete_is_optimistic() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    engine.delete_bookmark("r1").await.unwrap();

    assert!(engine.bookmarks().is_empty());
    assert!(!backend.contains("r1"));

    // The store's own delete event is a no-op by the time it arrives.
    engine.process_feed_events();
    assert!(engine.bookmarks().is_empty());
}

#[tokio::test]
async fn failed_delete_restores_the_record_via_reload() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    backend.inject_delete_failure();
    let err = engine.delete_bookmark("r1").await;

    assert!(matches!(err, Err(EngineError::RemoteWrite(_))));
    // The optimistic removal was rolled back by the authoritative reload.
    assert_eq!(engine.bookmarks().len(), 1);
    assert_eq!(engine.bookmarks()[0].id, "r1");
    assert!(matches!(
        engine.last_error(),
        Some(EngineError::RemoteWrite(_))
    ));
}

#[tokio::test]
async fn failed_initial_fetch_never_leaks_previous_user() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("a1", "Alice's", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();
    assert_eq!(engine.bookmarks().len(), 1);

    backend.inject_query_failure();
    let err = engine.on_session_change(Some(Session::new("bob"))).await;

    assert!(matches!(err, Err(EngineError::RemoteRead(_))));
    assert!(engine.bookmarks().is_empty());
    assert!(matches!(
        engine.last_error(),
        Some(EngineError::RemoteRead(_))
    ));
}

#[tokio::test]
async fn subscription_failure_keeps_fetched_collection() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));

    backend.inject_subscribe_failure();
    let err = engine.initialize(Some(Session::new("alice"))).await;

    assert!(matches!(err, Err(EngineError::Subscription(_))));
    assert_eq!(engine.bookmarks().len(), 1);
    assert!(!engine.is_subscribed());
}

#[tokio::test]
async fn error_slot_is_overwritten_by_the_next_action() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    backend.inject_delete_failure();
    let _ = engine.delete_bookmark("r1").await;
    assert!(matches!(
        engine.last_error(),
        Some(EngineError::RemoteWrite(_))
    ));

    engine
        .add_bookmark("B", "https://b.example.com")
        .await
        .unwrap();
    assert!(engine.last_error().is_none());
}

#[tokio::test]
async fn clear_error_dismisses_the_slot() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("r1", "A", "alice", 100));
    engine.initialize(Some(Session::new("alice"))).await.unwrap();

    backend.inject_delete_failure();
    let _ = engine.delete_bookmark("r1").await;
    assert!(engine.last_error().is_some());

    engine.clear_error();

    assert!(engine.last_error().is_none());
    // Dismissing the error touches nothing else.
    assert_eq!(engine.bookmarks().len(), 1);
}

#[tokio::test]
async fn teardown_stops_event_delivery() {
    let (backend, mut engine) = setup();
    engine.initialize(Some(Session::new("alice"))).await.unwrap();
    assert_eq!(backend.feed().subscriber_count(), 1);

    engine.teardown();

    assert_eq!(backend.feed().subscriber_count(), 0);
    let delivered = backend.feed().publish(
        "alice",
        ChangeEvent::Insert {
            after: bookmark("r9", "Late", "alice", 900),
        },
    );
    assert_eq!(delivered, 0);
    assert_eq!(engine.process_feed_events(), 0);
    assert!(engine.bookmarks().is_empty());
}

#[tokio::test]
async fn session_provider_drives_the_engine() {
    let (backend, mut engine) = setup();
    backend.seed(bookmark("a1", "Alice's", "alice", 100));
    let sessions = MemorySessions::new();
    let mut changes = sessions.session_changes();

    sessions.sign_in("alice", Some("alice@example.com"));
    let pushed = changes.recv().await.unwrap();
    assert_eq!(sessions.current_session(), pushed);
    engine.on_session_change(pushed).await.unwrap();
    assert!(engine.is_authenticated());
    assert_eq!(engine.bookmarks().len(), 1);

    sessions.sign_out();
    let pushed = changes.recv().await.unwrap();
    assert!(pushed.is_none());
    engine.on_session_change(pushed).await.unwrap();
    assert!(!engine.is_authenticated());
    assert!(engine.bookmarks().is_empty());
}
