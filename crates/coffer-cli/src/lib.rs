//! Shared wiring for the `coffer` binary.

use std::sync::Arc;

use anyhow::Context;
use coffer_core::models::{NewUser, User};
use coffer_core::CofferConfig;
use coffer_db::{
    MemoryFileRepository, MemoryUserRepository, PgFileRepository, PgUserRepository, UserRepository,
};
use coffer_services::{Coffer, ServiceContext};
use coffer_storage::LocalStorage;
use serde::Serialize;
use tempfile::TempDir;

/// Services plus whatever must stay alive while they run.
pub struct Backend {
    pub coffer: Coffer,
    pub users: Arc<dyn UserRepository>,
    /// Present in scratch mode; removed on drop
    _scratch: Option<TempDir>,
}

impl Backend {
    /// Postgres metadata and the configured upload directory.
    pub async fn connect(config: &CofferConfig) -> anyhow::Result<Self> {
        let pool = coffer_db::connect(config).await?;
        let storage = LocalStorage::new(&config.upload_path, config.storage_url.clone())
            .await
            .context("Failed to open upload directory")?;

        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
        let context = ServiceContext::new(
            Arc::new(PgFileRepository::new(pool)),
            users.clone(),
            Arc::new(storage),
        );

        Ok(Self {
            coffer: Coffer::new(context, config),
            users,
            _scratch: None,
        })
    }

    /// In-memory metadata and a temporary upload directory, both discarded
    /// on exit. A single default user is created.
    pub async fn scratch(config: &CofferConfig) -> anyhow::Result<(Self, User)> {
        let dir = tempfile::tempdir().context("Failed to create scratch directory")?;
        let storage = LocalStorage::new(dir.path(), config.storage_url.clone())
            .await
            .context("Failed to open scratch directory")?;

        let users = MemoryUserRepository::new();
        let user = users.create(NewUser::new("scratch", "scratch@localhost")).await?;

        let users: Arc<dyn UserRepository> = Arc::new(users);
        let context = ServiceContext::new(
            Arc::new(MemoryFileRepository::new()),
            users.clone(),
            Arc::new(storage),
        );

        let backend = Self {
            coffer: Coffer::new(context, config),
            users,
            _scratch: Some(dir),
        };
        Ok((backend, user))
    }
}

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("coffer=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Format a byte count for humans, e.g. `1.5 MiB`.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
