//! crates/booklog_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Book, ReadingSession};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A storage-level uniqueness rule was violated, e.g. a second open
    /// session for the same book.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable storage for books and their reading sessions.
///
/// Implementations must treat each write as atomic and must cascade a book
/// deletion to all of its sessions. At most one session per book may have a
/// null end page at a time; a second insert violating that rule returns
/// [`PortError::Conflict`].
#[async_trait]
pub trait ReadingStore: Send + Sync {
    // --- Book Management ---
    async fn create_book(&self, book: &Book) -> PortResult<()>;

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book>;

    async fn list_books(&self) -> PortResult<Vec<Book>>;

    async fn update_book(&self, book: &Book) -> PortResult<()>;

    /// Deletes the book and all of its sessions.
    async fn delete_book(&self, book_id: Uuid) -> PortResult<()>;

    /// Updates only the cached current-page value.
    async fn set_current_page(&self, book_id: Uuid, page: i64) -> PortResult<()>;

    // --- Session Management ---
    async fn create_session(&self, session: &ReadingSession) -> PortResult<()>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<ReadingSession>;

    /// Rewrites every mutable field of an existing session (post-hoc edit).
    async fn update_session(&self, session: &ReadingSession) -> PortResult<()>;

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;

    async fn sessions_for_book(&self, book_id: Uuid) -> PortResult<Vec<ReadingSession>>;

    /// Closes an open session and updates the owning book's cached current
    /// page in a single transaction, returning the finalized session.
    async fn finalize_session(
        &self,
        session_id: Uuid,
        end_page: i64,
        ended_at: DateTime<Utc>,
    ) -> PortResult<ReadingSession>;
}

/// Supplies the default cover blob for books without one.
pub trait CoverImageService: Send + Sync {
    fn default_cover(&self) -> &[u8];
}
