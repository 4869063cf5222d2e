//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use crate::web::ticker::ElapsedTicker;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use booklog_core::controller::SessionError;
use booklog_core::domain::{Book, ReadingSession};
use booklog_core::ports::PortError;
use booklog_core::progress;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_books_handler,
        create_book_handler,
        get_book_handler,
        update_book_handler,
        delete_book_handler,
        get_cover_handler,
        put_cover_handler,
        list_sessions_handler,
        log_session_handler,
        update_session_handler,
        delete_session_handler,
        reading_state_handler,
        start_reading_handler,
        pause_reading_handler,
        stop_reading_handler,
        finish_reading_handler,
    ),
    components(schemas(
        BookResponse,
        CreateBookRequest,
        UpdateBookRequest,
        SessionResponse,
        LogSessionRequest,
        UpdateSessionRequest,
        DayGroupResponse,
        ReadingState,
        ReadingStateResponse,
        PauseResponse,
        StopResponse,
        FinishRequest,
    )),
    tags(
        (name = "booklog API", description = "API endpoints for the personal reading tracker.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A book plus its derived progress values.
#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub total_pages: i64,
    pub current_page: i64,
    pub percent_complete: i64,
    pub has_cover: bool,
}

impl BookResponse {
    fn new(book: &Book, sessions: &[ReadingSession]) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            total_pages: book.total_pages,
            current_page: progress::current_page(sessions),
            percent_complete: progress::percent_complete(sessions, book.total_pages),
            has_cover: book.cover_image.is_some(),
        }
    }
}

/// Page counts arrive as the raw text the user typed; non-numeric input
/// falls back to 0 here and to the previous value on edit.
#[derive(Deserialize, ToSchema)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub total_pages: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateBookRequest {
    pub title: String,
    pub author: String,
    pub total_pages: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub start_page: i64,
    pub end_page: Option<i64>,
    pub pages_read: i64,
    pub active: bool,
}

impl From<&ReadingSession> for SessionResponse {
    fn from(s: &ReadingSession) -> Self {
        Self {
            id: s.id,
            book_id: s.book_id,
            started_at: s.started_at,
            ended_at: s.ended_at,
            start_page: s.start_page,
            end_page: s.end_page,
            pages_read: s.pages_read(),
            active: s.is_active(),
        }
    }
}

/// A manually logged session. Both pages must parse as integers or the
/// request is rejected.
#[derive(Deserialize, ToSchema)]
pub struct LogSessionRequest {
    pub started_at: DateTime<Utc>,
    pub start_page: String,
    pub end_page: String,
}

/// Post-hoc edit of a session; start/end pages and dates are arbitrary.
#[derive(Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub start_page: i64,
    pub end_page: Option<i64>,
}

/// One calendar day's sessions, newest first.
#[derive(Serialize, ToSchema)]
pub struct DayGroupResponse {
    pub day: NaiveDate,
    pub pages_read: i64,
    pub sessions: Vec<SessionResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReadingState {
    Idle,
    Active,
}

#[derive(Serialize, ToSchema)]
pub struct ReadingStateResponse {
    pub state: ReadingState,
    pub paused: bool,
    pub session: Option<SessionResponse>,
    pub elapsed_ms: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PauseResponse {
    pub paused: bool,
}

/// Returned by the stop request so the client can prompt for an end page.
#[derive(Serialize, ToSchema)]
pub struct StopResponse {
    pub session: SessionResponse,
    pub elapsed_ms: i64,
}

/// The raw end-page text collected after a stop request.
#[derive(Deserialize, ToSchema)]
pub struct FinishRequest {
    pub end_page: String,
}

//=========================================================================================
// Error Mapping Helpers
//=========================================================================================

fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unexpected(msg) => {
            error!("Store operation failed: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage failure".to_string(),
            )
        }
    }
}

fn session_error_response(e: SessionError) -> (StatusCode, String) {
    match e {
        SessionError::AlreadyActive | SessionError::NotActive => {
            (StatusCode::CONFLICT, e.to_string())
        }
        SessionError::EndPageBeforeStart { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        SessionError::Store(pe) => port_error_response(pe),
    }
}

//=========================================================================================
// Book Handlers
//=========================================================================================

/// List all books with derived progress.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "All books", body = [BookResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_books_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let books = app_state
        .store
        .list_books()
        .await
        .map_err(port_error_response)?;

    let mut responses = Vec::with_capacity(books.len());
    for book in &books {
        let sessions = app_state
            .store
            .sessions_for_book(book.id)
            .await
            .map_err(port_error_response)?;
        responses.push(BookResponse::new(book, &sessions));
    }
    Ok(Json(responses))
}

/// Add a book to the catalog.
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_book_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Non-numeric page counts become 0, matching the original entry form.
    let total_pages = payload.total_pages.trim().parse::<i64>().unwrap_or(0);
    let book = Book::new(payload.title, payload.author, total_pages);

    app_state
        .store
        .create_book(&book)
        .await
        .map_err(port_error_response)?;

    Ok((StatusCode::CREATED, Json(BookResponse::new(&book, &[]))))
}

/// Fetch one book with derived progress.
#[utoipa::path(
    get,
    path = "/books/{book_id}",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book = app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;
    let sessions = app_state
        .store
        .sessions_for_book(book_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(BookResponse::new(&book, &sessions)))
}

/// Edit a book's metadata.
#[utoipa::path(
    put,
    path = "/books/{book_id}",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    request_body = UpdateBookRequest,
    responses(
        (status = 200, description = "Updated book", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<UpdateBookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut book = app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    // A page count that doesn't parse keeps the previous value.
    book.total_pages = payload
        .total_pages
        .trim()
        .parse::<i64>()
        .unwrap_or(book.total_pages);
    book.title = payload.title;
    book.author = payload.author;

    app_state
        .store
        .update_book(&book)
        .await
        .map_err(port_error_response)?;

    let sessions = app_state
        .store
        .sessions_for_book(book_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(BookResponse::new(&book, &sessions)))
}

/// Delete a book and all of its sessions.
#[utoipa::path(
    delete,
    path = "/books/{book_id}",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Tear the reader down first so no ticker outlives the book.
    app_state.readers.remove(book_id).await;

    app_state
        .store
        .delete_book(book_id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a book's cover image, or the default cover when none is set.
#[utoipa::path(
    get,
    path = "/books/{book_id}/cover",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 200, description = "The cover blob", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_cover_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book = app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;
    let blob = book
        .cover_image
        .unwrap_or_else(|| app_state.covers.default_cover().to_vec());
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        blob,
    ))
}

/// Replace a book's cover image with the raw request body.
#[utoipa::path(
    put,
    path = "/books/{book_id}/cover",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    request_body(content_type = "application/octet-stream", description = "The cover blob."),
    responses(
        (status = 204, description = "Cover updated"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn put_cover_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut book = app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;
    book.cover_image = Some(body.to_vec());
    app_state
        .store
        .update_book(&book)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// List a book's sessions grouped by calendar day, newest first.
#[utoipa::path(
    get,
    path = "/books/{book_id}/sessions",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 200, description = "Sessions grouped by day", body = [DayGroupResponse]),
        (status = 404, description = "Book not found")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 404 for unknown books rather than an empty list.
    app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;
    let sessions = app_state
        .store
        .sessions_for_book(book_id)
        .await
        .map_err(port_error_response)?;

    let groups: Vec<DayGroupResponse> = progress::group_by_day(&sessions, &Local)
        .into_iter()
        .map(|group| DayGroupResponse {
            day: group.day,
            pages_read: progress::pages_read_in_group(&group),
            sessions: group.sessions.iter().map(SessionResponse::from).collect(),
        })
        .collect();
    Ok(Json(groups))
}

/// Log a finished session after the fact, with an arbitrary date.
#[utoipa::path(
    post,
    path = "/books/{book_id}/sessions",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    request_body = LogSessionRequest,
    responses(
        (status = 201, description = "Session logged", body = SessionResponse),
        (status = 400, description = "Pages were not numeric"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn log_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<LogSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    // Manual entry requires both pages to parse; there is no fallback here.
    let (start_page, end_page) = match (
        payload.start_page.trim().parse::<i64>(),
        payload.end_page.trim().parse::<i64>(),
    ) {
        (Ok(start), Ok(end)) => (start, end),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Start and end pages must be whole numbers".to_string(),
            ))
        }
    };

    let session = ReadingSession::logged(book_id, payload.started_at, start_page, end_page);
    app_state
        .store
        .create_session(&session)
        .await
        .map_err(port_error_response)?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// Edit a logged session in place.
#[utoipa::path(
    put,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "The session's unique ID.")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn update_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = app_state
        .store
        .get_session(session_id)
        .await
        .map_err(port_error_response)?;

    session.started_at = payload.started_at;
    session.ended_at = payload.ended_at;
    session.start_page = payload.start_page;
    session.end_page = payload.end_page;

    app_state
        .store
        .update_session(&session)
        .await
        .map_err(port_error_response)?;

    // The edit may have closed or reopened the book's active session; bring
    // the live reader back in line with the rows.
    app_state
        .readers
        .reconcile(session.book_id)
        .await
        .map_err(session_error_response)?;

    Ok(Json(SessionResponse::from(&session)))
}

/// Delete one session; the book and its other sessions are untouched.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "The session's unique ID.")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state
        .store
        .get_session(session_id)
        .await
        .map_err(port_error_response)?;

    app_state
        .store
        .delete_session(session_id)
        .await
        .map_err(port_error_response)?;

    // Deleting the active session must also release the live reader, or the
    // book stays blocked on a session that no longer exists and its ticker
    // keeps running.
    app_state
        .readers
        .reconcile(session.book_id)
        .await
        .map_err(session_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Live Reading Handlers
//=========================================================================================

/// The book's live-session state: idle or active, with elapsed time.
#[utoipa::path(
    get,
    path = "/books/{book_id}/reading",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 200, description = "Live session state", body = ReadingStateResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn reading_state_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    let reader = app_state
        .readers
        .reader(book_id, app_state.store.clone())
        .await
        .map_err(session_error_response)?;
    let reader = reader.lock().await;

    let response = match reader.controller.active_session() {
        Some(session) => ReadingStateResponse {
            state: ReadingState::Active,
            paused: reader.controller.is_paused(),
            session: Some(SessionResponse::from(session)),
            elapsed_ms: reader
                .ticker
                .as_ref()
                .map(|t| t.elapsed_ms())
                .or_else(|| reader.controller.elapsed(Utc::now()).map(|d| d.num_milliseconds())),
        },
        None => ReadingStateResponse {
            state: ReadingState::Idle,
            paused: false,
            session: None,
            elapsed_ms: None,
        },
    };
    Ok(Json(response))
}

/// Start a live reading session on the last known end page.
#[utoipa::path(
    post,
    path = "/books/{book_id}/reading/start",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 201, description = "Session started", body = SessionResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "A session is already active for this book")
    )
)]
pub async fn start_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book = app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    let reader = app_state
        .readers
        .reader(book_id, app_state.store.clone())
        .await
        .map_err(session_error_response)?;
    let mut reader = reader.lock().await;

    let session = reader
        .controller
        .start(&book, Utc::now())
        .await
        .map_err(session_error_response)?;

    // A stale ticker here would mean a session ended without tearing it
    // down; replace it rather than leak it.
    if reader.ticker.is_some() {
        warn!(%book_id, "Replacing a leftover elapsed ticker");
        reader.stop_ticker();
    }
    reader.ticker = Some(ElapsedTicker::spawn(session.started_at));

    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// Toggle the paused flag; the displayed clock freezes while paused.
#[utoipa::path(
    post,
    path = "/books/{book_id}/reading/pause",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 200, description = "Pause toggled", body = PauseResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No active session")
    )
)]
pub async fn pause_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Unknown books get a 404, not a reader entry.
    app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    let reader = app_state
        .readers
        .reader(book_id, app_state.store.clone())
        .await
        .map_err(session_error_response)?;
    let mut reader = reader.lock().await;

    match reader.controller.toggle_pause(Utc::now()) {
        Some(paused) => {
            if let Some(ticker) = &reader.ticker {
                ticker.set_paused(paused);
            }
            Ok(Json(PauseResponse { paused }))
        }
        None => Err((
            StatusCode::CONFLICT,
            "No reading session is active".to_string(),
        )),
    }
}

/// Request to stop: hands back the active session and elapsed time so the
/// client can prompt for the end page. Not a state transition.
#[utoipa::path(
    post,
    path = "/books/{book_id}/reading/stop",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    responses(
        (status = 200, description = "Stop requested", body = StopResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No active session")
    )
)]
pub async fn stop_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    let reader = app_state
        .readers
        .reader(book_id, app_state.store.clone())
        .await
        .map_err(session_error_response)?;
    let reader = reader.lock().await;

    let session = reader
        .controller
        .request_stop()
        .map_err(session_error_response)?;
    let elapsed_ms = reader
        .ticker
        .as_ref()
        .map(|t| t.elapsed_ms())
        .or_else(|| reader.controller.elapsed(Utc::now()).map(|d| d.num_milliseconds()))
        .unwrap_or(0);

    Ok(Json(StopResponse {
        session: SessionResponse::from(session),
        elapsed_ms,
    }))
}

/// Finalize the active session with the end page the user typed.
#[utoipa::path(
    post,
    path = "/books/{book_id}/reading/finish",
    params(("book_id" = Uuid, Path, description = "The book's unique ID.")),
    request_body = FinishRequest,
    responses(
        (status = 200, description = "Session finalized", body = SessionResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No active session"),
        (status = 422, description = "End page before start page")
    )
)]
pub async fn finish_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<FinishRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .get_book(book_id)
        .await
        .map_err(port_error_response)?;

    let reader = app_state
        .readers
        .reader(book_id, app_state.store.clone())
        .await
        .map_err(session_error_response)?;
    let mut reader = reader.lock().await;

    let finalized = reader
        .controller
        .finalize(&payload.end_page, Utc::now())
        .await
        .map_err(session_error_response)?;

    // The session is over on every successful finalize path; the ticker
    // must not outlive it.
    reader.stop_ticker();

    Ok(Json(SessionResponse::from(&finalized)))
}
