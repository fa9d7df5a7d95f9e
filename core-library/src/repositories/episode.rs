//! Episode repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{EpisodeRow, EpisodeWithArc, EpisodeWithArcRow, PersistedRecord};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};
use tracing::debug;

/// Episode repository interface for data access operations
#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    /// Read one page of persisted ids in ascending order
    async fn list_id_page(&self, page_request: PageRequest) -> Result<Vec<i64>>;

    /// Insert or update every record in one transaction, keyed by id
    ///
    /// `created_at` of an existing row is preserved; `title`, `release_date`,
    /// `arc_id` and `updated_at` are overwritten.
    ///
    /// # Returns
    /// Number of records written
    ///
    /// # Errors
    /// Any failure rolls back the whole batch.
    async fn upsert_batch(&self, records: &[PersistedRecord]) -> Result<u64>;

    /// Verify the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Find an episode by its id
    ///
    /// # Returns
    /// - `Ok(Some(record))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: i64) -> Result<Option<PersistedRecord>>;

    /// Count total episodes
    async fn count(&self) -> Result<i64>;

    /// Lowest and highest persisted id, `None` when the table is empty
    async fn id_range(&self) -> Result<Option<(i64, i64)>>;

    /// Query episodes joined with their arc names, ordered by id
    async fn query_with_arcs(&self, page_request: PageRequest) -> Result<Page<EpisodeWithArc>>;

    /// Query the episodes assigned to one arc, ordered by id
    async fn query_by_arc(
        &self,
        arc_id: i64,
        page_request: PageRequest,
    ) -> Result<Page<PersistedRecord>>;
}

/// SQLite implementation of EpisodeRepository
pub struct SqliteEpisodeRepository {
    pool: SqlitePool,
}

impl SqliteEpisodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EpisodeRepository for SqliteEpisodeRepository {
    async fn list_id_page(&self, page_request: PageRequest) -> Result<Vec<i64>> {
        let ids = query_scalar::<_, i64>("SELECT id FROM episodes ORDER BY id LIMIT ? OFFSET ?")
            .bind(page_request.limit())
            .bind(page_request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn upsert_batch(&self, records: &[PersistedRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        if let Some(blank) = records.iter().find(|r| r.title.trim().is_empty()) {
            return Err(LibraryError::invalid_input(
                "title",
                format!("episode {} has an empty title", blank.id),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for record in records {
            let result = query(
                r#"
                INSERT INTO episodes (id, title, release_date, arc_id, created_at, updated_at)
                VALUES (
                    ?, ?, ?, ?,
                    CAST(strftime('%s', 'now') AS INTEGER),
                    CAST(strftime('%s', 'now') AS INTEGER)
                )
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    release_date = excluded.release_date,
                    arc_id = excluded.arc_id,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(record.id)
            .bind(&record.title)
            .bind(record.release_date_text())
            .bind(record.arc_id)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;

        debug!(records = records.len(), written, "Episode batch committed");
        Ok(written)
    }

    async fn ping(&self) -> Result<()> {
        query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PersistedRecord>> {
        let row = query_as::<_, EpisodeRow>(
            r#"
            SELECT id, title, release_date, arc_id, created_at, updated_at
            FROM episodes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PersistedRecord::try_from).transpose()
    }

    async fn count(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM episodes")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn id_range(&self) -> Result<Option<(i64, i64)>> {
        let (min, max): (Option<i64>, Option<i64>) =
            query_as("SELECT MIN(id), MAX(id) FROM episodes")
                .fetch_one(&self.pool)
                .await?;

        Ok(min.zip(max))
    }

    async fn query_with_arcs(&self, page_request: PageRequest) -> Result<Page<EpisodeWithArc>> {
        let total = self.count().await?;

        let rows = query_as::<_, EpisodeWithArcRow>(
            r#"
            SELECT e.id, e.title, e.release_date, e.arc_id, e.created_at, e.updated_at,
                   a.name AS arc_name
            FROM episodes e
            LEFT JOIN arcs a ON a.id = e.arc_id
            ORDER BY e.id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(EpisodeWithArc::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total as u64, page_request))
    }

    async fn query_by_arc(
        &self,
        arc_id: i64,
        page_request: PageRequest,
    ) -> Result<Page<PersistedRecord>> {
        let total = query_scalar::<_, i64>("SELECT COUNT(*) FROM episodes WHERE arc_id = ?")
            .bind(arc_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = query_as::<_, EpisodeRow>(
            r#"
            SELECT id, title, release_date, arc_id, created_at, updated_at
            FROM episodes
            WHERE arc_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(arc_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(PersistedRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total as u64, page_request))
    }
}
