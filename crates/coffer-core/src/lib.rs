//! Coffer Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! path validation shared by every Coffer component.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::CofferConfig;
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel, QuotaViolation};
