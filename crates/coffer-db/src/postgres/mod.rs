//! PostgreSQL repositories

mod file;
mod user;

pub use file::PgFileRepository;
pub use user::PgUserRepository;
