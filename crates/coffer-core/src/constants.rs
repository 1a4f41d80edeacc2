//! Fixed limits and defaults.

/// Longest side an uploaded image may keep after normalization.
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

/// JPEG quality used when re-encoding images (0-100).
pub const JPEG_QUALITY: u8 = 85;

/// Number of leading bytes inspected for content sniffing.
pub const SNIFF_LEN: usize = 512;

/// Text files above this size cannot be read or written through the editor.
pub const MAX_EDITABLE_BYTES: i64 = 1024 * 1024;

/// Extension used for stored objects whose verified type is unknown.
pub const FALLBACK_EXTENSION: &str = "bin";

// Per-user quota defaults for newly created users
pub const DEFAULT_MAX_FILES: i64 = 1000;
pub const DEFAULT_MAX_FILE_SIZE: i64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_STORAGE: i64 = 1024 * 1024 * 1024;

// Listing
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
