//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{covers::EmbeddedCoverAdapter, db::SqliteStore},
    config::Config,
    error::ApiError,
    web::{
        create_book_handler, delete_book_handler, delete_session_handler,
        finish_reading_handler, get_book_handler, get_cover_handler, list_books_handler,
        list_sessions_handler, log_session_handler, pause_reading_handler, put_cover_handler,
        reading_state_handler, rest::ApiDoc, start_reading_handler, state::AppState,
        state::ReaderRegistry, stop_reading_handler, update_book_handler,
        update_session_handler,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Store ---
    // A store that fails to open is the one unrecoverable startup error.
    info!("Opening database at {}", config.database_url);
    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    info!("Database ready.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        covers: Arc::new(EmbeddedCoverAdapter),
        config: config.clone(),
        readers: ReaderRegistry::new(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/books", get(list_books_handler).post(create_book_handler))
        .route(
            "/books/{book_id}",
            get(get_book_handler)
                .put(update_book_handler)
                .delete(delete_book_handler),
        )
        .route(
            "/books/{book_id}/cover",
            get(get_cover_handler).put(put_cover_handler),
        )
        .route(
            "/books/{book_id}/sessions",
            get(list_sessions_handler).post(log_session_handler),
        )
        .route(
            "/sessions/{session_id}",
            put(update_session_handler).delete(delete_session_handler),
        )
        .route("/books/{book_id}/reading", get(reading_state_handler))
        .route("/books/{book_id}/reading/start", post(start_reading_handler))
        .route("/books/{book_id}/reading/pause", post(pause_reading_handler))
        .route("/books/{book_id}/reading/stop", post(stop_reading_handler))
        .route(
            "/books/{book_id}/reading/finish",
            post(finish_reading_handler),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete
    // application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
