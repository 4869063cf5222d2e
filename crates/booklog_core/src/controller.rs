//! crates/booklog_core/src/controller.rs
//!
//! The live reading-session state machine: Idle, or Active with an optional
//! paused flag. One controller instance drives at most one session, and the
//! service keeps one controller per book, so "at most one active session per
//! book" holds both in-process and (via the store's uniqueness rule) at rest.
//!
//! State transitions only happen after the corresponding write succeeds:
//! a failed `start` leaves the controller Idle, a failed `finalize` leaves
//! the session active, and the caller sees the error instead of a silently
//! diverged in-memory state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{Book, ReadingSession};
use crate::ports::{PortError, ReadingStore};
use crate::progress;

/// Errors surfaced by [`SessionController`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A reading session is already active for this book")]
    AlreadyActive,
    #[error("No reading session is active")]
    NotActive,
    #[error("End page {end_page} is before start page {start_page}")]
    EndPageBeforeStart { start_page: i64, end_page: i64 },
    #[error(transparent)]
    Store(#[from] PortError),
}

struct ActiveReading {
    session: ReadingSession,
    /// Set while paused; the displayed clock freezes at this instant. The
    /// session's `started_at` is never adjusted, so resuming shows full
    /// wall-clock elapsed again.
    paused_at: Option<DateTime<Utc>>,
}

/// Drives start / pause / stop / finalize for one book's live session.
pub struct SessionController {
    store: Arc<dyn ReadingStore>,
    active: Option<ActiveReading>,
}

impl SessionController {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            active: None,
        }
    }

    /// Adopts an already-persisted open session for `book_id`, if one exists.
    /// The stored row with a null end page is the source of truth for "a
    /// session is in progress"; this lets a fresh controller (e.g. after a
    /// restart) pick it up instead of refusing every start with a conflict.
    pub async fn hydrate(&mut self, book_id: Uuid) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Ok(());
        }
        let sessions = self.store.sessions_for_book(book_id).await?;
        if let Some(open) = sessions.into_iter().find(|s| s.is_active()) {
            self.active = Some(ActiveReading {
                session: open,
                paused_at: None,
            });
        }
        Ok(())
    }

    /// Drops the in-memory active entry without touching storage. Used when
    /// the underlying row was deleted or closed by an out-of-band edit; a
    /// following [`hydrate`](Self::hydrate) re-reads whatever the store now
    /// holds.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Begins a new session for `book`, starting on the last known end page.
    ///
    /// The session row is persisted (with a null end page) before the
    /// controller transitions; if the write fails, the controller stays Idle.
    pub async fn start(
        &mut self,
        book: &Book,
        now: DateTime<Utc>,
    ) -> Result<ReadingSession, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let sessions = self.store.sessions_for_book(book.id).await?;
        let start_page = progress::last_known_end_page(&sessions);
        let session = ReadingSession::started(book.id, now, start_page);

        match self.store.create_session(&session).await {
            Ok(()) => {}
            // Another writer already holds the open-session slot.
            Err(PortError::Conflict(_)) => return Err(SessionError::AlreadyActive),
            Err(e) => return Err(e.into()),
        }

        self.active = Some(ActiveReading {
            session: session.clone(),
            paused_at: None,
        });
        Ok(session)
    }

    /// Flips the paused flag. Returns the new flag, or `None` when Idle
    /// (pausing with no active session has no effect).
    pub fn toggle_pause(&mut self, now: DateTime<Utc>) -> Option<bool> {
        let active = self.active.as_mut()?;
        active.paused_at = match active.paused_at {
            Some(_) => None,
            None => Some(now),
        };
        Some(active.paused_at.is_some())
    }

    /// Signals intent to stop: validates that a session is active and hands
    /// back its data so the caller can collect an end page. Not a transition.
    pub fn request_stop(&self) -> Result<&ReadingSession, SessionError> {
        self.active
            .as_ref()
            .map(|a| &a.session)
            .ok_or(SessionError::NotActive)
    }

    /// Closes the active session with the raw end-page text the user typed.
    ///
    /// Non-numeric input silently falls back to the session's start page.
    /// An end page before the start page is rejected and the session stays
    /// active, as does the session when the store write fails.
    pub async fn finalize(
        &mut self,
        end_page_input: &str,
        now: DateTime<Utc>,
    ) -> Result<ReadingSession, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NotActive)?;
        let start_page = active.session.start_page;

        let end_page = end_page_input
            .trim()
            .parse::<i64>()
            .unwrap_or(start_page);
        if end_page < start_page {
            return Err(SessionError::EndPageBeforeStart {
                start_page,
                end_page,
            });
        }

        let finalized = self
            .store
            .finalize_session(active.session.id, end_page, now)
            .await?;

        self.active = None;
        Ok(finalized)
    }

    /// Wall-clock time since the session started, frozen at the pause instant
    /// while paused. `None` when Idle.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.active
            .as_ref()
            .map(|a| a.paused_at.unwrap_or(now) - a.session.started_at)
    }

    pub fn active_session(&self) -> Option<&ReadingSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn is_paused(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| a.paused_at.is_some())
            .unwrap_or(false)
    }
}
