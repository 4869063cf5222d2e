//! services/api/src/adapters/covers.rs
//!
//! Default cover art for books without an uploaded image, behind the
//! `CoverImageService` port.

use booklog_core::ports::CoverImageService;

/// A 1x1 transparent PNG. Clients that care about a prettier placeholder
/// substitute their own; the contract is only "a decodable bitmap".
const DEFAULT_COVER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15,
    0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, // IDAT
    0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
    0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82, // IEND
];

/// Serves the built-in placeholder cover.
pub struct EmbeddedCoverAdapter;

impl CoverImageService for EmbeddedCoverAdapter {
    fn default_cover(&self) -> &[u8] {
        DEFAULT_COVER_PNG
    }
}
