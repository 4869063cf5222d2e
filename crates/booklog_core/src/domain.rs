//! crates/booklog_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A book in the user's catalog.
///
/// `current_page` is a cached value kept in step with the most recent
/// finalized session; the authoritative derivation lives in
/// [`crate::progress::current_page`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    /// Pages are 1-indexed; expected to be positive but not enforced here.
    pub total_pages: i64,
    pub current_page: i64,
    /// Opaque cover blob. Absence means the caller supplies a default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<Vec<u8>>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: impl Into<String>, total_pages: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            author: author.into(),
            total_pages,
            current_page: 0,
            cover_image: None,
        }
    }
}

/// One logged interval of reading bound to a book.
///
/// A session with no end page is *active*: the null end page in the persisted
/// row is the single source of truth for "a session is in progress", so there
/// is no separate activity flag to drift out of sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSession {
    pub id: Uuid,
    pub book_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// The page the session began on; >= 0.
    pub start_page: i64,
    /// Present only once finalized; invariant `end_page >= start_page`.
    pub end_page: Option<i64>,
}

impl ReadingSession {
    /// A fresh, unfinalized session beginning at `start_page`.
    pub fn started(book_id: Uuid, started_at: DateTime<Utc>, start_page: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            started_at,
            ended_at: None,
            start_page,
            end_page: None,
        }
    }

    /// A fully specified session, for post-hoc manual entry.
    pub fn logged(
        book_id: Uuid,
        started_at: DateTime<Utc>,
        start_page: i64,
        end_page: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            started_at,
            ended_at: Some(started_at),
            start_page,
            end_page: Some(end_page),
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_page.is_none()
    }

    /// Pages covered by this session: `max(0, end - start + 1)` once
    /// finalized, `0` while active.
    pub fn pages_read(&self) -> i64 {
        match self.end_page {
            Some(end) => (end - self.start_page + 1).max(0),
            None => 0,
        }
    }
}
