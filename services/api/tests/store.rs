//! Integration tests for the SQLite store adapter, run against an in-memory
//! database.

use api_lib::adapters::db::SqliteStore;
use booklog_core::controller::SessionController;
use booklog_core::domain::{Book, ReadingSession};
use booklog_core::ports::{PortError, ReadingStore};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

async fn store_with_book() -> (SqliteStore, Book) {
    let store = SqliteStore::new_in_memory().await.expect("open store");
    let book = Book::new("Dune", "Frank Herbert", 412);
    store.create_book(&book).await.expect("create book");
    (store, book)
}

#[tokio::test]
async fn book_roundtrip_and_update() {
    let (store, book) = store_with_book().await;

    let fetched = store.get_book(book.id).await.unwrap();
    assert_eq!(fetched.title, "Dune");
    assert_eq!(fetched.total_pages, 412);
    assert_eq!(fetched.current_page, 0);
    assert!(fetched.cover_image.is_none());

    let mut edited = fetched;
    edited.title = "Dune Messiah".to_string();
    edited.total_pages = 256;
    edited.cover_image = Some(vec![1, 2, 3]);
    store.update_book(&edited).await.unwrap();

    let fetched = store.get_book(book.id).await.unwrap();
    assert_eq!(fetched.title, "Dune Messiah");
    assert_eq!(fetched.total_pages, 256);
    assert_eq!(fetched.cover_image, Some(vec![1, 2, 3]));

    let all = store.list_books().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn missing_book_is_not_found() {
    let store = SqliteStore::new_in_memory().await.unwrap();
    let id = uuid::Uuid::new_v4();
    assert!(matches!(
        store.get_book(id).await.unwrap_err(),
        PortError::NotFound(_)
    ));
    assert!(matches!(
        store.delete_book(id).await.unwrap_err(),
        PortError::NotFound(_)
    ));
    let ghost = Book::new("Nope", "Nobody", 1);
    assert!(matches!(
        store.update_book(&ghost).await.unwrap_err(),
        PortError::NotFound(_)
    ));
}

#[tokio::test]
async fn sessions_roundtrip_ordered_newest_first() {
    let (store, book) = store_with_book().await;

    let a = ReadingSession::logged(book.id, at(1, 12), 0, 20);
    let b = ReadingSession::logged(book.id, at(2, 12), 20, 45);
    store.create_session(&a).await.unwrap();
    store.create_session(&b).await.unwrap();

    let sessions = store.sessions_for_book(book.id).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, b.id);
    assert_eq!(sessions[1].id, a.id);
    assert_eq!(sessions[1].started_at, at(1, 12));
    assert_eq!(sessions[1].end_page, Some(20));
}

#[tokio::test]
async fn only_one_open_session_per_book() {
    let (store, book) = store_with_book().await;

    let open = ReadingSession::started(book.id, at(1, 10), 0);
    store.create_session(&open).await.unwrap();

    // A second open session for the same book violates the partial unique
    // index and surfaces as a conflict.
    let second = ReadingSession::started(book.id, at(1, 11), 0);
    assert!(matches!(
        store.create_session(&second).await.unwrap_err(),
        PortError::Conflict(_)
    ));

    // A different book is unaffected.
    let other = Book::new("Hyperion", "Dan Simmons", 482);
    store.create_book(&other).await.unwrap();
    store
        .create_session(&ReadingSession::started(other.id, at(1, 11), 0))
        .await
        .unwrap();

    // Once the first session closes, the slot frees up.
    store.finalize_session(open.id, 15, at(1, 12)).await.unwrap();
    store.create_session(&second).await.unwrap();
}

#[tokio::test]
async fn finalize_closes_session_and_book_page_together() {
    let (store, book) = store_with_book().await;

    let open = ReadingSession::started(book.id, at(1, 10), 0);
    store.create_session(&open).await.unwrap();

    let finalized = store.finalize_session(open.id, 25, at(1, 11)).await.unwrap();
    assert_eq!(finalized.end_page, Some(25));
    assert_eq!(finalized.ended_at, Some(at(1, 11)));
    assert_eq!(finalized.pages_read(), 26);

    let fetched = store.get_book(book.id).await.unwrap();
    assert_eq!(fetched.current_page, 25);

    assert!(matches!(
        store
            .finalize_session(uuid::Uuid::new_v4(), 1, at(1, 12))
            .await
            .unwrap_err(),
        PortError::NotFound(_)
    ));
}

#[tokio::test]
async fn deleting_a_book_cascades_to_sessions() {
    let (store, book) = store_with_book().await;
    let session = ReadingSession::logged(book.id, at(1, 12), 0, 20);
    store.create_session(&session).await.unwrap();

    store.delete_book(book.id).await.unwrap();
    assert!(matches!(
        store.get_session(session.id).await.unwrap_err(),
        PortError::NotFound(_)
    ));
}

#[tokio::test]
async fn sessions_can_be_edited_and_deleted_independently() {
    let (store, book) = store_with_book().await;
    let session = ReadingSession::logged(book.id, at(1, 12), 0, 20);
    store.create_session(&session).await.unwrap();

    let mut edited = session.clone();
    edited.start_page = 5;
    edited.end_page = Some(30);
    edited.started_at = at(2, 9);
    store.update_session(&edited).await.unwrap();

    let fetched = store.get_session(session.id).await.unwrap();
    assert_eq!(fetched.start_page, 5);
    assert_eq!(fetched.end_page, Some(30));
    assert_eq!(fetched.started_at, at(2, 9));

    store.delete_session(session.id).await.unwrap();
    assert!(matches!(
        store.delete_session(session.id).await.unwrap_err(),
        PortError::NotFound(_)
    ));
    // The book survives its session.
    store.get_book(book.id).await.unwrap();
}

#[tokio::test]
async fn controller_flow_over_sqlite() {
    let (store, book) = store_with_book().await;
    let store = Arc::new(store);

    let mut controller = SessionController::new(store.clone());
    let started = controller.start(&book, at(1, 10)).await.unwrap();
    assert_eq!(started.start_page, 0);
    assert!(store.get_session(started.id).await.unwrap().is_active());

    let finalized = controller.finalize("20", at(1, 11)).await.unwrap();
    assert_eq!(finalized.end_page, Some(20));
    assert_eq!(store.get_book(book.id).await.unwrap().current_page, 20);

    // Next session picks up where the last one ended.
    let second = controller.start(&book, at(2, 10)).await.unwrap();
    assert_eq!(second.start_page, 20);

    // A second controller (fresh process) adopts the open row on hydrate.
    let mut other = SessionController::new(store.clone());
    other.hydrate(book.id).await.unwrap();
    assert_eq!(other.active_session().unwrap().id, second.id);
}
