pub mod rest;
pub mod state;
pub mod ticker;

// Re-export the handlers the binary needs to build the router.
pub use rest::{
    create_book_handler, delete_book_handler, delete_session_handler, finish_reading_handler,
    get_book_handler, get_cover_handler, list_books_handler, list_sessions_handler,
    log_session_handler, pause_reading_handler, put_cover_handler, reading_state_handler,
    start_reading_handler, stop_reading_handler, update_book_handler, update_session_handler,
};
