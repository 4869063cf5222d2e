pub mod controller;
pub mod domain;
pub mod ports;
pub mod progress;

pub use controller::{SessionController, SessionError};
pub use domain::{Book, ReadingSession};
pub use ports::{CoverImageService, PortError, PortResult, ReadingStore};
