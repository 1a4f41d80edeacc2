//! Validation modules

pub mod path;

pub use path::{file_extension, sanitize_filename, sanitize_folder_path};
