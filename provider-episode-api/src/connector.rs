//! Episode API connector
//!
//! Implements `EpisodeSource` against the `/episodes/en` endpoints.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::{EpisodeSource, RawCandidate};
use core_runtime::config::{
    IdRange, DEFAULT_EPISODE_API_URL, DEFAULT_FETCH_CONCURRENCY, DEFAULT_HTTP_TIMEOUT_SECS,
    MAX_ID_RANGE_LEN,
};
use core_runtime::logging::redact_if_sensitive;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::error::{EpisodeApiError, Result};
use crate::types::ApiEpisode;

/// JSON episode API client
///
/// Without an id range the whole list comes from one listing request. With
/// one, every id in the range is fetched individually, at most
/// `concurrency` requests at a time.
///
/// # Example
///
/// ```ignore
/// use provider_episode_api::EpisodeApiSource;
///
/// let source = EpisodeApiSource::new(http_client)
///     .with_id_range(IdRange::new(1, 1100))
///     .with_concurrency(5);
/// let candidates = source.fetch_candidates().await?;
/// ```
pub struct EpisodeApiSource {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
    concurrency: usize,
    id_range: Option<IdRange>,
}

impl EpisodeApiSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: DEFAULT_EPISODE_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            id_range: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum in-flight requests in per-id mode; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Switch to per-id mode over `range`
    pub fn with_id_range(mut self, range: IdRange) -> Self {
        self.id_range = Some(range);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Clone self for spawned tasks
    fn clone_for_task(&self) -> Self {
        Self {
            http_client: Arc::clone(&self.http_client),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            concurrency: self.concurrency,
            id_range: self.id_range,
        }
    }

    fn listing_url(&self) -> String {
        format!("{}/episodes/en", self.base_url)
    }

    fn episode_url(&self, id: i64) -> String {
        format!("{}/episodes/en/{}", self.base_url, id)
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(self.timeout);
        Ok(self.http_client.execute(request).await?)
    }

    /// Fetch the complete listing
    ///
    /// # Errors
    ///
    /// Fails on a non-2xx status or a body that is not a JSON array.
    /// Individual malformed entries are kept, not rejected.
    #[instrument(skip(self), fields(base_url = %redact_if_sensitive("base_url", &self.base_url)))]
    pub async fn fetch_all(&self) -> Result<Vec<RawCandidate>> {
        let url = self.listing_url();
        info!("Fetching episode listing");

        let response = self.get(&url).await?;
        if !response.is_success() {
            warn!(status = response.status, "Episode listing request failed");
            return Err(EpisodeApiError::Http {
                status_code: response.status,
                url,
            });
        }

        let entries: Vec<Value> = response
            .json()
            .map_err(|e| EpisodeApiError::Parse(format!("episode listing: {}", e)))?;

        let candidates: Vec<RawCandidate> = entries
            .into_iter()
            .map(ApiEpisode::from_value)
            .map(RawCandidate::from)
            .collect();

        info!(episodes = candidates.len(), "Fetched episode listing");
        Ok(candidates)
    }

    /// Fetch one episode, `None` when the API does not know it
    #[instrument(skip(self))]
    pub async fn fetch_episode(&self, id: i64) -> Result<Option<RawCandidate>> {
        let url = self.episode_url(id);
        let response = self.get(&url).await?;

        if response.is_not_found() {
            debug!("Episode not found");
            return Ok(None);
        }
        if !response.is_success() {
            return Err(EpisodeApiError::Http {
                status_code: response.status,
                url,
            });
        }

        let value: Value = response
            .json()
            .map_err(|e| EpisodeApiError::Parse(format!("episode {}: {}", id, e)))?;
        if !value.is_object() {
            debug!("Episode response is not an object");
            return Ok(None);
        }

        let episode = ApiEpisode::from_value(value);
        debug!(
            title = ?episode.title,
            arc = ?episode.arc_title(),
            "Fetched episode"
        );
        Ok(Some(episode.into()))
    }

    /// Fetch every id in `range`, skipping ids that fail or are absent
    ///
    /// Results come back in id order.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeApiError::RangeTooLarge`] for a range wider than
    /// [`MAX_ID_RANGE_LEN`], and [`EpisodeApiError::Unavailable`] when at
    /// least one request failed and none produced an episode. Ids the API
    /// answers with 404 are absent, not failed.
    #[instrument(skip(self), fields(range = %range, concurrency = self.concurrency))]
    pub async fn fetch_range(&self, range: IdRange) -> Result<Vec<RawCandidate>> {
        let requested = range.len();
        if requested > MAX_ID_RANGE_LEN {
            return Err(EpisodeApiError::RangeTooLarge {
                range: range.to_string(),
                len: requested,
                max: MAX_ID_RANGE_LEN,
            });
        }

        info!("Fetching {} episodes individually", requested);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut ids = Vec::new();
        let mut handles = Vec::new();

        for id in range.start..=range.end {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(episode_id = id, error = %e, "Fetch permits closed");
                    break;
                }
            };
            let source = self.clone_for_task();

            let handle = tokio::spawn(async move {
                let result = source.fetch_episode(id).await;
                drop(permit);
                result
            });
            ids.push(id);
            handles.push(handle);
        }

        let results = join_all(handles).await;
        let mut candidates = Vec::new();
        let mut absent = 0usize;
        let mut failed = 0usize;

        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(Ok(Some(candidate))) => candidates.push(candidate),
                Ok(Ok(None)) => absent += 1,
                Ok(Err(e)) => {
                    warn!(episode_id = id, error = %e, "Failed to fetch episode, skipping");
                    failed += 1;
                }
                Err(e) => {
                    warn!(episode_id = id, error = %e, "Episode fetch task failed, skipping");
                    failed += 1;
                }
            }
        }

        info!(
            fetched = candidates.len(),
            absent,
            failed,
            "Fetched {} of {} requested episodes",
            candidates.len(),
            requested
        );

        if candidates.is_empty() && failed > 0 {
            warn!(failed, "No episode in range could be fetched");
            return Err(EpisodeApiError::Unavailable { failed, requested });
        }
        Ok(candidates)
    }
}

#[async_trait]
impl EpisodeSource for EpisodeApiSource {
    fn name(&self) -> &str {
        "episode-api"
    }

    async fn fetch_candidates(&self) -> bridge_traits::error::Result<Vec<RawCandidate>> {
        match self.id_range {
            Some(range) => Ok(self.fetch_range(range).await?),
            None => Ok(self.fetch_all().await?),
        }
    }

    /// Healthy when episode 1 answers 200 or 404
    async fn health_check(&self) -> bool {
        match self.get(&self.episode_url(1)).await {
            Ok(response) => response.is_success() || response.is_not_found(),
            Err(e) => {
                warn!(
                    error = %e,
                    base_url = %redact_if_sensitive("base_url", &self.base_url),
                    "Episode API health check failed"
                );
                false
            }
        }
    }
}
