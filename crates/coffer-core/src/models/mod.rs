//! Data models shared across Coffer crates

mod file;
mod folder;
mod query;
mod user;

pub use file::*;
pub use folder::*;
pub use query::*;
pub use user::*;
