//! Coffer Storage Library
//!
//! This crate provides the physical store abstraction and its local
//! filesystem implementation.
//!
//! # Layout
//!
//! Objects are sharded by owner and upload day:
//!
//! `{root}/{user_id}/{YYYY-MM-DD}/{uuid}.{ext}`
//!
//! The layout is independent of the logical folder a file is tagged with, so
//! moving a file between folders never touches the disk. Paths handed back to
//! the store must resolve inside the root.

pub(crate) mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
