//! # Episode Store Pool
//!
//! Opens the SQLite episode store and applies the embedded migrations.
//!
//! File databases run in WAL mode with a busy timeout so the status command
//! can read while a sync is writing. `:memory:` databases are private to the
//! connection that opened them, so their pool holds exactly one connection
//! that is never recycled.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("episodes.db")).await?;
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const IN_MEMORY_PATH: &str = ":memory:";
const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Where the store lives and how many connections it may use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `None` for an in-memory store
    path: Option<PathBuf>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked file before failing
    pub busy_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// A store backed by `path`, or an in-memory one for `:memory:`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.as_os_str() == IN_MEMORY_PATH {
            return Self::in_memory();
        }

        Self {
            path: Some(path),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::ZERO,
            idle_timeout: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Ignored for in-memory stores
    pub fn max_connections(mut self, max: u32) -> Self {
        if !self.is_in_memory() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.path {
            None => SqliteConnectOptions::from_str(IN_MEMORY_URL)?,
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(self.busy_timeout),
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout);

        if self.is_in_memory() {
            // Losing the only connection would drop the whole database.
            options.min_connections(1).max_lifetime(None::<Duration>)
        } else {
            options
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the store, migrate it and verify it answers
///
/// # Errors
///
/// Returns [`LibraryError::Database`] if the file cannot be opened or
/// created, [`LibraryError::Migration`] if a migration fails.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    let location = config
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| IN_MEMORY_PATH.to_string());
    info!(
        database = %location,
        max_connections = config.max_connections,
        "Opening episode store"
    );

    let pool = config
        .pool_options()
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| {
            warn!(error = %e, database = %location, "Failed to open episode store");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    debug!(connections = pool.size(), "Episode store ready");
    Ok(pool)
}

/// Migrated in-memory store
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    debug!("Migrations applied");
    Ok(())
}

/// `SELECT 1` round-trip
///
/// # Errors
///
/// Returns [`LibraryError::Database`] if the store does not answer.
pub async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(LibraryError::Database)?;
    Ok(())
}
