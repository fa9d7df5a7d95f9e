//! # Sync Run Repository
//!
//! Persists the summary of every finalized run so the service can report the
//! last sync and a short history.

use crate::stats::{RunOutcome, RunState, SyncRunId, SyncStats};
use crate::{Result, SyncError};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Domain Type
// ============================================================================

/// Stored summary of one finalized run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub source: String,
    pub outcome: RunOutcome,
    pub episodes_seen: u64,
    pub rejected: u64,
    pub existing_in_store: u64,
    pub new_found: u64,
    pub inserted: u64,
    pub failed: u64,
    pub unassigned: u64,
    pub error_message: Option<String>,
    /// Unix seconds
    pub started_at: i64,
    /// Unix seconds
    pub finished_at: i64,
}

impl SyncRun {
    /// Snapshot finalized stats
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] if the stats have not
    /// been finalized.
    pub fn from_stats(stats: &SyncStats) -> Result<Self> {
        let (Some(outcome), Some(started_at), Some(finished_at)) =
            (stats.outcome(), stats.started_at(), stats.finished_at())
        else {
            return Err(SyncError::InvalidStateTransition {
                from: stats.state().as_str().to_string(),
                to: RunState::Finalized.as_str().to_string(),
                reason: "Only finalized runs can be stored".to_string(),
            });
        };

        Ok(Self {
            id: stats.run_id,
            source: stats.source.clone(),
            outcome,
            episodes_seen: stats.episodes_seen(),
            rejected: stats.rejected(),
            existing_in_store: stats.existing_in_store(),
            new_found: stats.new_found(),
            inserted: stats.inserted(),
            failed: stats.failed(),
            unassigned: stats.unassigned(),
            error_message: stats.error_message().map(str::to_string),
            started_at: started_at.timestamp(),
            finished_at: finished_at.timestamp(),
        })
    }

    pub fn duration_secs(&self) -> i64 {
        self.finished_at - self.started_at
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Store a finalized run
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn insert(&self, run: &SyncRun) -> Result<()>;

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>>;

    /// Most recently started run
    async fn find_latest(&self) -> Result<Option<SyncRun>>;

    /// Runs ordered most recent first
    async fn history(&self, limit: u32) -> Result<Vec<SyncRun>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SyncRunRow {
    id: String,
    source: String,
    status: String,
    episodes_seen: i64,
    rejected: i64,
    existing_in_store: i64,
    new_found: i64,
    inserted: i64,
    failed: i64,
    unassigned: i64,
    error_message: Option<String>,
    started_at: i64,
    finished_at: i64,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = SyncError;

    fn try_from(row: SyncRunRow) -> Result<Self> {
        Ok(SyncRun {
            id: SyncRunId::from_string(&row.id)?,
            source: row.source,
            outcome: row.status.parse()?,
            episodes_seen: row.episodes_seen as u64,
            rejected: row.rejected as u64,
            existing_in_store: row.existing_in_store as u64,
            new_found: row.new_found as u64,
            inserted: row.inserted as u64,
            failed: row.failed as u64,
            unassigned: row.unassigned as u64,
            error_message: row.error_message,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

const SELECT_RUN: &str = r#"
    SELECT id, source, status,
           episodes_seen, rejected, existing_in_store, new_found,
           inserted, failed, unassigned,
           error_message, started_at, finished_at
    FROM sync_runs
"#;

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, source, status,
                episodes_seen, rejected, existing_in_store, new_found,
                inserted, failed, unassigned,
                error_message, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.as_str())
        .bind(&run.source)
        .bind(run.outcome.as_str())
        .bind(run.episodes_seen as i64)
        .bind(run.rejected as i64)
        .bind(run.existing_in_store as i64)
        .bind(run.new_found as i64)
        .bind(run.inserted as i64)
        .bind(run.failed as i64)
        .bind(run.unassigned as i64)
        .bind(&run.error_message)
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>> {
        let row = sqlx::query_as::<_, SyncRunRow>(&format!("{} WHERE id = ?", SELECT_RUN))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(SyncRun::try_from).transpose()
    }

    async fn find_latest(&self) -> Result<Option<SyncRun>> {
        let row = sqlx::query_as::<_, SyncRunRow>(&format!(
            "{} ORDER BY started_at DESC, rowid DESC LIMIT 1",
            SELECT_RUN
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(SyncRun::try_from).transpose()
    }

    async fn history(&self, limit: u32) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
            "{} ORDER BY started_at DESC, rowid DESC LIMIT ?",
            SELECT_RUN
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter()
            .map(SyncRun::try_from)
            .collect::<Result<Vec<_>>>()
    }
}

// ============================================================================
// Tests
// ============================================================================
