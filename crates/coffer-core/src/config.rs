//! Configuration module
//!
//! Settings are read from the process environment, after loading a `.env`
//! file when one is present.

use std::env;
use std::path::PathBuf;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct CofferConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Root directory of the physical store
    pub upload_path: PathBuf,
    /// Public base URL that stored paths are joined onto
    pub storage_url: String,
    /// Global ceiling applied to every upload before per-user quotas
    pub max_upload_bytes: u64,
}

impl Default for CofferConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            upload_path: PathBuf::from("./uploads"),
            storage_url: "http://localhost:8080".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl CofferConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            upload_path: env::var("UPLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_path),
            storage_url: env::var("STORAGE_URL").unwrap_or(defaults.storage_url),
            max_upload_bytes: match env::var("MAX_FILE_SIZE") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("MAX_FILE_SIZE must be a number of bytes"))?,
                Err(_) => MAX_UPLOAD_BYTES,
            },
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_upload_bytes == 0 {
            anyhow::bail!("MAX_FILE_SIZE must be greater than zero");
        }
        if self.db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be greater than zero");
        }
        if self.storage_url.trim().is_empty() {
            anyhow::bail!("STORAGE_URL must not be empty");
        }
        if self.upload_path.as_os_str().is_empty() {
            anyhow::bail!("UPLOAD_PATH must not be empty");
        }
        Ok(())
    }

    /// Returns the database URL or an error explaining it is required.
    pub fn require_database_url(&self) -> Result<&str, anyhow::Error> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }
}
