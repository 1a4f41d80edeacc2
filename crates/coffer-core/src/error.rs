//! Error types module
//!
//! All failures surfaced by Coffer are unified under [`AppError`]. Each
//! variant classifies into one [`ErrorKind`] so an outer transport can map it
//! without inspecting messages.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::fmt;
use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Rejected uploads and quota violations
    Warn,
    /// Unexpected failures
    Error,
}

/// Coarse classification of an error, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    QuotaExceeded,
    SecurityRejected,
    NotFound,
    Forbidden,
    IoFailure,
}

/// Which per-user limit an operation would have crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaViolation {
    FileSize { size: i64, limit: i64 },
    FileCount { count: i64, limit: i64 },
    Storage { used: i64, incoming: i64, limit: i64 },
}

impl fmt::Display for QuotaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaViolation::FileSize { .. } => f.write_str("file size exceeds your limit"),
            QuotaViolation::FileCount { .. } => f.write_str("maximum number of files reached"),
            QuotaViolation::Storage { .. } => f.write_str("storage limit exceeded"),
        }
    }
}

/// Metadata for error responses: how an error should be presented and logged.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "QUOTA_EXCEEDED")
    fn error_code(&self) -> &'static str;

    fn kind(&self) -> ErrorKind;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from callers
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(QuotaViolation),

    #[error("Rejected: {0}")]
    SecurityRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io {
            context: err.kind().to_string(),
            source: err,
        }
    }
}

/// Static metadata for each variant: (error_code, kind, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, ErrorKind, bool, LogLevel) {
    match err {
        AppError::Database(_) => (
            "DATABASE_ERROR",
            ErrorKind::IoFailure,
            true,
            LogLevel::Error,
        ),
        AppError::Validation(_) => (
            "VALIDATION_ERROR",
            ErrorKind::Validation,
            false,
            LogLevel::Debug,
        ),
        AppError::QuotaExceeded(_) => (
            "QUOTA_EXCEEDED",
            ErrorKind::QuotaExceeded,
            false,
            LogLevel::Warn,
        ),
        AppError::SecurityRejected(_) => (
            "SECURITY_REJECTED",
            ErrorKind::SecurityRejected,
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => ("NOT_FOUND", ErrorKind::NotFound, false, LogLevel::Debug),
        AppError::Forbidden(_) => ("FORBIDDEN", ErrorKind::Forbidden, true, LogLevel::Warn),
        AppError::ImageProcessing(_) => (
            "IMAGE_PROCESSING_ERROR",
            ErrorKind::Validation,
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            ErrorKind::IoFailure,
            true,
            LogLevel::Error,
        ),
        AppError::Io { .. } => ("IO_ERROR", ErrorKind::IoFailure, true, LogLevel::Error),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            ErrorKind::IoFailure,
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn kind(&self) -> ErrorKind {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        // Nothing in the storage engine is retried.
        false
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::QuotaExceeded(violation) => violation.to_string(),
            AppError::SecurityRejected(ref msg) => msg.clone(),
            // Foreign resources must be indistinguishable from missing ones.
            AppError::NotFound(_) | AppError::Forbidden(_) => "file not found".to_string(),
            AppError::ImageProcessing(ref msg) => msg.clone(),
            AppError::Storage(_) | AppError::Io { .. } => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
