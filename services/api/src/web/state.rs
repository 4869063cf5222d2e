//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-book reader registry.

use crate::config::Config;
use crate::web::ticker::ElapsedTicker;
use booklog_core::controller::{SessionController, SessionError};
use booklog_core::ports::{CoverImageService, ReadingStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers.
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub covers: Arc<dyn CoverImageService>,
    pub config: Arc<Config>,
    pub readers: ReaderRegistry,
}

//=========================================================================================
// Per-Book Reader State
//=========================================================================================

/// The live-session machinery for one book: its controller and, while a
/// session is running, the elapsed-time ticker.
pub struct BookReader {
    pub controller: SessionController,
    pub ticker: Option<ElapsedTicker>,
}

impl BookReader {
    /// Stops and drops the ticker. Called on every path that ends the
    /// session, so no recurring task outlives it.
    pub fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

/// Hands out one `BookReader` per book, each behind its own mutex.
///
/// All live-session mutation for a book goes through its reader lock, which
/// makes the single-writer-per-book rule explicit instead of relying on
/// "only one screen is open at a time" as the original app did.
#[derive(Default)]
pub struct ReaderRegistry {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<BookReader>>>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or creates the reader for `book_id`. A fresh reader hydrates
    /// from the store: a persisted session with no end page is adopted as
    /// the active one and its ticker restarted.
    pub async fn reader(
        &self,
        book_id: Uuid,
        store: Arc<dyn ReadingStore>,
    ) -> Result<Arc<Mutex<BookReader>>, SessionError> {
        let mut inner = self.inner.lock().await;
        if let Some(reader) = inner.get(&book_id) {
            return Ok(reader.clone());
        }

        let mut controller = SessionController::new(store);
        controller.hydrate(book_id).await?;
        let ticker = controller
            .active_session()
            .map(|s| ElapsedTicker::spawn(s.started_at));

        let reader = Arc::new(Mutex::new(BookReader { controller, ticker }));
        inner.insert(book_id, reader.clone());
        Ok(reader)
    }

    /// Re-syncs an existing reader with the store after an out-of-band
    /// session edit or delete: the open row (or its absence) wins over
    /// whatever the controller remembers, and the ticker follows suit.
    /// Readers are only created on demand, so an absent entry needs nothing.
    pub async fn reconcile(&self, book_id: Uuid) -> Result<(), SessionError> {
        let entry = self.inner.lock().await.get(&book_id).cloned();
        let Some(reader) = entry else {
            return Ok(());
        };

        let mut reader = reader.lock().await;
        reader.stop_ticker();
        reader.controller.clear_active();
        reader.controller.hydrate(book_id).await?;
        if let Some(session) = reader.controller.active_session() {
            let started_at = session.started_at;
            reader.ticker = Some(ElapsedTicker::spawn(started_at));
        }
        Ok(())
    }

    /// Drops a book's reader, stopping any running ticker. Used when the
    /// book is deleted.
    pub async fn remove(&self, book_id: Uuid) {
        let removed = self.inner.lock().await.remove(&book_id);
        if let Some(reader) = removed {
            reader.lock().await.stop_ticker();
        }
    }
}
