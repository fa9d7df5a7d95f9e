//! Sync service façade
//!
//! Owns the pool, the repositories and the configured source for the
//! lifetime of the process. Each call to [`SyncService::sync`] builds a
//! fresh `SyncCoordinator` over those shared handles.

use crate::error::{CoreError, Result};
use bridge_desktop::ReqwestHttpClient;
use bridge_traits::{Clock, EpisodeSource, HttpClient, SystemClock};
use core_library::db::{self, DatabaseConfig};
use core_library::repositories::{
    ArcRepository, EpisodeRepository, Page, PageRequest, SqliteArcRepository,
    SqliteEpisodeRepository,
};
use core_library::{ArcRange, EpisodeWithArc, PersistedRecord};
use core_runtime::logging::redact_if_sensitive;
use core_runtime::{AppConfig, SourceKind};
use core_sync::{SqliteSyncRunRepository, SyncConfig, SyncCoordinator, SyncRun, SyncRunRepository, SyncStats};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

// ============================================================================
// Reports
// ============================================================================

/// One arc's episode span
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArcCoverage {
    pub arc_id: i64,
    pub name: String,
    pub start_episode: i64,
    pub end_episode: i64,
}

impl From<ArcRange> for ArcCoverage {
    fn from(arc: ArcRange) -> Self {
        Self {
            arc_id: arc.arc_id,
            name: arc.name,
            start_episode: arc.start_episode,
            end_episode: arc.end_episode,
        }
    }
}

/// Snapshot of the store and the last run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub source: String,
    pub store_healthy: bool,
    pub episode_count: i64,
    pub min_episode_id: Option<i64>,
    pub max_episode_id: Option<i64>,
    /// Number of non-fallback arcs
    pub arc_count: usize,
    pub arcs: Vec<ArcCoverage>,
    pub fallback_arc: Option<ArcCoverage>,
    pub latest_run: Option<SyncRun>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub source: String,
    pub store_healthy: bool,
    pub source_healthy: bool,
    pub healthy: bool,
}

// ============================================================================
// Service
// ============================================================================

/// Primary façade exposed to the CLI
pub struct SyncService {
    config: AppConfig,
    pool: SqlitePool,
    source: Arc<dyn EpisodeSource>,
    episodes: Arc<dyn EpisodeRepository>,
    arcs: Arc<dyn ArcRepository>,
    runs: Arc<dyn SyncRunRepository>,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    /// Open the store and build the configured source
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for an invalid configuration,
    /// [`CoreError::Library`] when the database cannot be opened or migrated,
    /// and [`CoreError::CapabilityMissing`] when the configured source was
    /// compiled out.
    #[instrument(skip(config), fields(source = %config.source, database = %config.database_path.display()))]
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let pool = db::create_pool(DatabaseConfig::new(config.database_path.clone())).await?;

        let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(
            Duration::from_secs(config.http_timeout_secs),
        )?);
        let source = build_source(&config, http_client)?;

        info!(
            source = source.name(),
            source_url = %redact_if_sensitive("source_url", &config.source_url),
            "Sync service initialized"
        );
        Ok(Self::new(config, pool, source))
    }

    /// Assemble a service over an existing pool and source
    pub fn new(config: AppConfig, pool: SqlitePool, source: Arc<dyn EpisodeSource>) -> Self {
        Self {
            episodes: Arc::new(SqliteEpisodeRepository::new(pool.clone())),
            arcs: Arc::new(SqliteArcRepository::new(pool.clone())),
            runs: Arc::new(SqliteSyncRunRepository::new(pool.clone())),
            clock: Arc::new(SystemClock),
            config,
            pool,
            source,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    fn sync_config(&self, force_update: bool) -> SyncConfig {
        SyncConfig {
            batch_size: self.config.batch_size,
            id_page_size: self.config.id_page_size,
            sync_timeout_secs: self.config.sync_timeout_secs,
            force_update,
        }
    }

    /// Run one sync pass
    ///
    /// With `force_update` every valid candidate is written, not only the
    /// ones missing from the store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SyncFailed`] for a fatal run failure; the partial
    /// stats are available through [`CoreError::sync_stats`].
    pub async fn sync(&self, cancel: CancellationToken, force_update: bool) -> Result<SyncStats> {
        let coordinator = SyncCoordinator::new(
            Arc::clone(&self.source),
            Arc::clone(&self.episodes),
            Arc::clone(&self.arcs),
            Arc::clone(&self.clock),
        )
        .with_config(self.sync_config(force_update))
        .with_run_repository(Arc::clone(&self.runs));

        Ok(coordinator.run(cancel).await?)
    }

    /// Describe the store contents and the last run
    ///
    /// An unreachable store yields a report with `store_healthy = false`
    /// and no counts.
    pub async fn status(&self) -> Result<StatusReport> {
        let mut report = StatusReport {
            source: self.source.name().to_string(),
            ..StatusReport::default()
        };

        if let Err(e) = db::health_check(&self.pool).await {
            warn!(error = %e, "Store health check failed");
            return Ok(report);
        }
        report.store_healthy = true;

        report.episode_count = self.episodes.count().await?;
        if let Some((min, max)) = self.episodes.id_range().await? {
            report.min_episode_id = Some(min);
            report.max_episode_id = Some(max);
        }

        for arc in self.arcs.list_all().await? {
            if arc.is_fallback() {
                report.fallback_arc = Some(arc.into());
            } else {
                report.arcs.push(arc.into());
            }
        }
        report.arc_count = report.arcs.len();

        report.latest_run = self.runs.find_latest().await?;
        Ok(report)
    }

    /// One page of stored episodes with their arc names, ordered by id
    pub async fn episodes(&self, page: PageRequest) -> Result<Page<EpisodeWithArc>> {
        Ok(self.episodes.query_with_arcs(page).await?)
    }

    /// One page of the episodes assigned to `arc_id`
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArcNotFound`] if no such arc exists.
    pub async fn episodes_in_arc(
        &self,
        arc_id: i64,
        page: PageRequest,
    ) -> Result<(ArcCoverage, Page<PersistedRecord>)> {
        let arc = self
            .arcs
            .find_by_id(arc_id)
            .await?
            .ok_or(CoreError::ArcNotFound(arc_id))?;
        let episodes = self.episodes.query_by_arc(arc_id, page).await?;
        Ok((arc.into(), episodes))
    }

    /// Probe the store and the source concurrently
    pub async fn health_check(&self) -> HealthReport {
        let (store, source_healthy) =
            tokio::join!(db::health_check(&self.pool), self.source.health_check());

        let store_healthy = match store {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Store health check failed");
                false
            }
        };

        HealthReport {
            source: self.source.name().to_string(),
            store_healthy,
            source_healthy,
            healthy: store_healthy && source_healthy,
        }
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
        info!("Sync service closed");
    }
}

fn build_source(
    config: &AppConfig,
    http_client: Arc<dyn HttpClient>,
) -> Result<Arc<dyn EpisodeSource>> {
    let timeout = Duration::from_secs(config.http_timeout_secs);

    match config.source {
        #[cfg(feature = "filler-list")]
        SourceKind::FillerList => Ok(Arc::new(
            provider_filler_list::FillerListScraper::new(http_client)
                .with_url(config.source_url.clone())
                .with_timeout(timeout),
        )),

        #[cfg(feature = "episode-api")]
        SourceKind::EpisodeApi => {
            let mut source = provider_episode_api::EpisodeApiSource::new(http_client)
                .with_base_url(config.source_url.clone())
                .with_timeout(timeout)
                .with_concurrency(config.fetch_concurrency);
            if let Some(range) = config.id_range {
                source = source.with_id_range(range);
            }
            Ok(Arc::new(source))
        }

        #[allow(unreachable_patterns)]
        other => {
            let _ = (http_client, timeout);
            Err(CoreError::CapabilityMissing {
                capability: other.to_string(),
                message: format!("built without the `{}` feature", other.as_str()),
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::RawCandidate;
    #[cfg(feature = "episode-api")]
    use core_runtime::IdRange;
    use core_sync::{RunOutcome, SyncError};
    use mockall::mock;

    mock! {
        Source {}

        #[async_trait]
        impl EpisodeSource for Source {
            fn name(&self) -> &str;
            async fn fetch_candidates(&self) -> BridgeResult<Vec<RawCandidate>>;
            async fn health_check(&self) -> bool;
        }
    }

    fn candidate(id: i64, title: &str) -> RawCandidate {
        RawCandidate {
            id: Some(id),
            title: Some(title.to_string()),
            release_date: None,
        }
    }

    fn config() -> AppConfig {
        AppConfig::builder()
            .database_path(":memory:")
            .build()
            .unwrap()
    }

    async fn service(source: MockSource) -> SyncService {
        let pool = db::create_test_pool().await.unwrap();
        SyncService::new(config(), pool, Arc::new(source))
    }

    fn source_with(candidates: Vec<RawCandidate>) -> MockSource {
        let mut source = MockSource::new();
        source.expect_name().return_const("fake".to_string());
        source
            .expect_fetch_candidates()
            .returning(move || Ok(candidates.clone()));
        source
    }

    #[tokio::test]
    async fn test_sync_then_status() {
        let service = service(source_with(vec![
            candidate(1, "Romance Dawn"),
            candidate(2, "The Great Swordsman Appears"),
            candidate(3, "Morgan versus Luffy"),
        ]))
        .await;

        let stats = service.sync(CancellationToken::new(), false).await.unwrap();
        assert_eq!(stats.new_found(), 3);
        assert_eq!(stats.inserted(), 3);

        let status = service.status().await.unwrap();
        assert!(status.store_healthy);
        assert_eq!(status.source, "fake");
        assert_eq!(status.episode_count, 3);
        assert_eq!(status.min_episode_id, Some(1));
        assert_eq!(status.max_episode_id, Some(3));
        assert_eq!(status.arc_count, 0);
        assert_eq!(
            status.fallback_arc.map(|arc| arc.name),
            Some(core_library::FALLBACK_ARC_NAME.to_string())
        );

        let latest = status.latest_run.unwrap();
        assert_eq!(latest.outcome, RunOutcome::Completed);
        assert_eq!(latest.inserted, 3);
    }

    #[tokio::test]
    async fn test_force_update_rewrites_existing() {
        let service = service(source_with(vec![candidate(1, "A"), candidate(2, "B")])).await;

        service.sync(CancellationToken::new(), false).await.unwrap();
        let again = service.sync(CancellationToken::new(), false).await.unwrap();
        assert_eq!(again.new_found(), 0);

        let forced = service.sync(CancellationToken::new(), true).await.unwrap();
        assert_eq!(forced.existing_in_store(), 2);
        assert_eq!(forced.inserted(), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_carries_stats() {
        let mut source = MockSource::new();
        source.expect_name().return_const("fake".to_string());
        source
            .expect_fetch_candidates()
            .returning(|| Err(BridgeError::OperationFailed("503".to_string())));
        let service = service(source).await;

        let err = service.sync(CancellationToken::new(), false).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::SyncFailed(ref f) if matches!(f.error, SyncError::SourceUnavailable(_))
        ));
        let stats = err.sync_stats().unwrap();
        assert_eq!(stats.outcome(), Some(RunOutcome::Failed));
        assert_eq!(stats.episodes_seen(), 0);

        let status = service.status().await.unwrap();
        assert_eq!(status.latest_run.unwrap().outcome, RunOutcome::Failed);
    }

    #[tokio::test]
    async fn test_status_on_empty_store() {
        let service = service(source_with(vec![])).await;
        let status = service.status().await.unwrap();

        assert!(status.store_healthy);
        assert_eq!(status.episode_count, 0);
        assert_eq!(status.min_episode_id, None);
        assert!(status.latest_run.is_none());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["episode_count"], 0);
        assert!(json["latest_run"].is_null());
    }

    #[tokio::test]
    async fn test_episode_listing() {
        let service = service(source_with(vec![
            candidate(1, "Romance Dawn"),
            candidate(2, "The Great Swordsman Appears"),
            candidate(3, "Morgan versus Luffy"),
        ]))
        .await;
        service.sync(CancellationToken::new(), false).await.unwrap();

        let page = service.episodes(PageRequest::first(2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert!(page.has_next());
        assert_eq!(page.items[0].episode.id, 1);
        assert_eq!(
            page.items[0].arc_name.as_deref(),
            Some(core_library::FALLBACK_ARC_NAME)
        );

        let fallback = service.status().await.unwrap().fallback_arc.unwrap();
        let (arc, in_arc) = service
            .episodes_in_arc(fallback.arc_id, PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(arc, fallback);
        assert_eq!(in_arc.total, 3);

        let missing = service.episodes_in_arc(9999, PageRequest::first(10)).await;
        assert!(matches!(missing, Err(CoreError::ArcNotFound(9999))));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut source = source_with(vec![]);
        source.expect_health_check().times(1).returning(|| false);
        let service = service(source).await;

        let report = service.health_check().await;
        assert!(report.store_healthy);
        assert!(!report.source_healthy);
        assert!(!report.healthy);
    }

    #[tokio::test]
    async fn test_closed_pool_reports_unhealthy_store() {
        let mut source = source_with(vec![]);
        source.expect_health_check().returning(|| true);
        let service = service(source).await;
        service.pool.close().await;

        assert!(!service.status().await.unwrap().store_healthy);
        assert!(!service.health_check().await.healthy);
    }

    #[tokio::test]
    async fn test_sync_config_follows_app_config() {
        let pool = db::create_test_pool().await.unwrap();
        let config = AppConfig::builder()
            .database_path(":memory:")
            .batch_size(25)
            .id_page_size(500)
            .sync_timeout_secs(60)
            .build()
            .unwrap();
        let service = SyncService::new(config, pool, Arc::new(source_with(vec![])));

        let sync_config = service.sync_config(true);
        assert_eq!(sync_config.batch_size, 25);
        assert_eq!(sync_config.id_page_size, 500);
        assert_eq!(sync_config.sync_timeout_secs, 60);
        assert!(sync_config.force_update);
    }

    #[cfg(feature = "episode-api")]
    #[tokio::test]
    async fn test_bootstrap_builds_configured_source() {
        let config = AppConfig::builder()
            .database_path(":memory:")
            .source(SourceKind::EpisodeApi)
            .id_range(IdRange::new(1, 10))
            .build()
            .unwrap();

        let service = SyncService::bootstrap(config).await.unwrap();
        assert_eq!(service.source_name(), "episode-api");
        assert!(service.status().await.unwrap().store_healthy);
        service.close().await;
    }

    #[cfg(feature = "filler-list")]
    #[tokio::test]
    async fn test_bootstrap_defaults_to_filler_list() {
        let service = SyncService::bootstrap(config()).await.unwrap();
        assert_eq!(service.source_name(), "filler-list");
        service.close().await;
    }
}
