//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `ReadingStore` port from the `core` crate. It
//! handles all interactions with the embedded SQLite database using `sqlx`.

use async_trait::async_trait;
use booklog_core::domain::{Book, ReadingSession};
use booklog_core::ports::{PortError, PortResult, ReadingStore};
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite-backed store that implements the `ReadingStore` port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and applies the
    /// schema. Failure here is fatal to startup.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// An in-memory database for tests. A single connection keeps every
    /// query on the same transient database.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Applies the schema at startup.
    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                total_pages INTEGER NOT NULL,
                current_page INTEGER NOT NULL DEFAULT 0,
                cover_image BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reading_sessions (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                start_page INTEGER NOT NULL,
                end_page INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one open (end_page IS NULL) session per book, enforced at
        // the data layer so concurrent starts cannot race past the service.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_open_per_book
            ON reading_sessions(book_id) WHERE end_page IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sessions_book
            ON reading_sessions(book_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Maps a sqlx error to the port taxonomy, flagging uniqueness violations.
fn map_sqlx(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(ref db) = e {
        if matches!(db.kind(), ErrorKind::UniqueViolation) {
            return PortError::Conflict(db.to_string());
        }
    }
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BookRecord {
    id: String,
    title: String,
    author: String,
    total_pages: i64,
    current_page: i64,
    cover_image: Option<Vec<u8>>,
}

impl BookRecord {
    fn to_domain(self) -> PortResult<Book> {
        Ok(Book {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| PortError::Unexpected(format!("Corrupt book id: {}", e)))?,
            title: self.title,
            author: self.author,
            total_pages: self.total_pages,
            current_page: self.current_page,
            cover_image: self.cover_image,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    book_id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    start_page: i64,
    end_page: Option<i64>,
}

impl SessionRecord {
    fn to_domain(self) -> PortResult<ReadingSession> {
        let parse = |s: &str| {
            Uuid::parse_str(s)
                .map_err(|e| PortError::Unexpected(format!("Corrupt session id: {}", e)))
        };
        Ok(ReadingSession {
            id: parse(&self.id)?,
            book_id: parse(&self.book_id)?,
            started_at: self.started_at,
            ended_at: self.ended_at,
            start_page: self.start_page,
            end_page: self.end_page,
        })
    }
}

//=========================================================================================
// `ReadingStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReadingStore for SqliteStore {
    async fn create_book(&self, book: &Book) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO books (id, title, author, total_pages, current_page, cover_image) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(book.id.to_string())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.total_pages)
        .bind(book.current_page)
        .bind(&book.cover_image)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "SELECT id, title, author, total_pages, current_page, cover_image \
             FROM books WHERE id = ?",
        )
        .bind(book_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Book {} not found", book_id)),
            _ => map_sqlx(e),
        })?;
        record.to_domain()
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT id, title, author, total_pages, current_page, cover_image \
             FROM books ORDER BY title ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_book(&self, book: &Book) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE books SET title = ?, author = ?, total_pages = ?, current_page = ?, \
             cover_image = ? WHERE id = ?",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.total_pages)
        .bind(book.current_page)
        .bind(&book.cover_image)
        .bind(book.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book.id)));
        }
        Ok(())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        // Sessions go with the book via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn set_current_page(&self, book_id: Uuid, page: i64) -> PortResult<()> {
        let result = sqlx::query("UPDATE books SET current_page = ? WHERE id = ?")
            .bind(page)
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn create_session(&self, session: &ReadingSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO reading_sessions (id, book_id, started_at, ended_at, start_page, end_page) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(session.book_id.to_string())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.start_page)
        .bind(session.end_page)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<ReadingSession> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, book_id, started_at, ended_at, start_page, end_page \
             FROM reading_sessions WHERE id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Session {} not found", session_id))
            }
            _ => map_sqlx(e),
        })?;
        record.to_domain()
    }

    async fn update_session(&self, session: &ReadingSession) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE reading_sessions SET started_at = ?, ended_at = ?, start_page = ?, \
             end_page = ? WHERE id = ?",
        )
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.start_page)
        .bind(session.end_page)
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Session {} not found",
                session.id
            )));
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reading_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Session {} not found",
                session_id
            )));
        }
        Ok(())
    }

    async fn sessions_for_book(&self, book_id: Uuid) -> PortResult<Vec<ReadingSession>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, book_id, started_at, ended_at, start_page, end_page \
             FROM reading_sessions WHERE book_id = ? ORDER BY started_at DESC",
        )
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        end_page: i64,
        ended_at: DateTime<Utc>,
    ) -> PortResult<ReadingSession> {
        // The session close and the book's cached current page move together
        // or not at all.
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let result = sqlx::query(
            "UPDATE reading_sessions SET end_page = ?, ended_at = ? WHERE id = ?",
        )
        .bind(end_page)
        .bind(ended_at)
        .bind(session_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Session {} not found",
                session_id
            )));
        }

        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, book_id, started_at, ended_at, start_page, end_page \
             FROM reading_sessions WHERE id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let session = record.to_domain()?;

        sqlx::query("UPDATE books SET current_page = ? WHERE id = ?")
            .bind(end_page)
            .bind(session.book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(session)
    }
}
