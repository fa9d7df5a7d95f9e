//! Arc repository trait and implementation
//!
//! Arcs are administered outside the sync engine; this repository only reads.

use crate::error::Result;
use crate::models::ArcRange;
use async_trait::async_trait;
use sqlx::{query_as, query_scalar, SqlitePool};

/// Arc repository interface
#[async_trait]
pub trait ArcRepository: Send + Sync {
    /// Every arc, including the fallback, ordered by `(start_episode, id)`
    async fn list_all(&self) -> Result<Vec<ArcRange>>;

    /// Find an arc by its id
    async fn find_by_id(&self, arc_id: i64) -> Result<Option<ArcRange>>;

    /// Count total arcs
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of ArcRepository
pub struct SqliteArcRepository {
    pool: SqlitePool,
}

impl SqliteArcRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArcRepository for SqliteArcRepository {
    async fn list_all(&self) -> Result<Vec<ArcRange>> {
        let arcs = query_as::<_, ArcRange>(
            r#"
            SELECT id AS arc_id, name, start_episode, end_episode, description
            FROM arcs
            ORDER BY start_episode ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(arcs)
    }

    async fn find_by_id(&self, arc_id: i64) -> Result<Option<ArcRange>> {
        let arc = query_as::<_, ArcRange>(
            r#"
            SELECT id AS arc_id, name, start_episode, end_episode, description
            FROM arcs
            WHERE id = ?
            "#,
        )
        .bind(arc_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(arc)
    }

    async fn count(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM arcs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
