//! Filler list page connector
//!
//! Implements `EpisodeSource` on top of the `HttpClient` bridge.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::{EpisodeSource, RawCandidate};
use core_runtime::config::{DEFAULT_FILLER_LIST_URL, DEFAULT_HTTP_TIMEOUT_SECS};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{FillerListError, Result};
use crate::parser::parse_episode_table;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Scrapes the episode table of a filler list show page
///
/// # Example
///
/// ```ignore
/// use provider_filler_list::FillerListScraper;
/// use bridge_traits::EpisodeSource;
///
/// let scraper = FillerListScraper::new(http_client);
/// let candidates = scraper.fetch_candidates().await?;
/// ```
pub struct FillerListScraper {
    http_client: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
}

impl FillerListScraper {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            url: DEFAULT_FILLER_LIST_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Scrape a different show page
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, method: HttpMethod) -> HttpRequest {
        HttpRequest::new(method, self.url.clone())
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .timeout(self.timeout)
    }

    /// Fetch the raw page HTML
    ///
    /// # Errors
    ///
    /// Returns [`FillerListError::Http`] for a non-2xx status. Network errors
    /// surface from the HTTP client once its retries are exhausted.
    #[instrument(skip(self), fields(url = %redact_if_sensitive("url", &self.url)))]
    pub async fn fetch_page(&self) -> Result<String> {
        info!("Fetching filler list page");
        let response = self.http_client.execute(self.request(HttpMethod::Get)).await?;

        if !response.is_success() {
            warn!(status = response.status, "Filler list page request failed");
            return Err(FillerListError::Http {
                status_code: response.status,
                url: self.url.clone(),
            });
        }

        let html = response.text()?;
        debug!(bytes = html.len(), status = response.status, "Fetched filler list page");
        Ok(html)
    }

    /// Fetch and parse the episode table
    pub async fn scrape(&self) -> Result<Vec<RawCandidate>> {
        let html = self.fetch_page().await?;
        let candidates = parse_episode_table(&html)?;
        info!(episodes = candidates.len(), "Scraped episode table");
        Ok(candidates)
    }
}

#[async_trait]
impl EpisodeSource for FillerListScraper {
    fn name(&self) -> &str {
        "filler-list"
    }

    async fn fetch_candidates(&self) -> bridge_traits::error::Result<Vec<RawCandidate>> {
        Ok(self.scrape().await?)
    }

    async fn health_check(&self) -> bool {
        match self.http_client.execute(self.request(HttpMethod::Head)).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                warn!(
                    error = %e,
                    url = %redact_if_sensitive("url", &self.url),
                    "Filler list health check failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    const PAGE: &str = r#"<html><body><table class="EpisodeList">
        <thead><tr><th>#</th><th>Title</th><th>Type</th><th>Airdate</th></tr></thead>
        <tbody>
          <tr><td class="Number">1</td><td class="Title"><a href="/e/1">I'm Luffy!</a></td><td class="Date">1999-10-20</td></tr>
          <tr><td class="Number">2</td><td class="Title"><a href="/e/2">The Great Swordsman Appears!</a></td><td class="Date">1999-11-17</td></tr>
        </tbody></table></body></html>"#;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_fetch_candidates_success() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(req.url, "https://example.com/shows/one-piece");
            assert!(req.headers.contains_key("User-Agent"));
            assert!(req.headers.contains_key("Accept-Language"));
            Ok(response(200, PAGE))
        });

        let scraper = FillerListScraper::new(Arc::new(mock_http))
            .with_url("https://example.com/shows/one-piece");
        let candidates = scraper.fetch_candidates().await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].id, Some(2));
        assert_eq!(scraper.name(), "filler-list");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(503, "Service Unavailable")));

        let scraper = FillerListScraper::new(Arc::new(mock_http));
        let result = scraper.fetch_candidates().await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(ref m)) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_missing_table_is_parse_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "<html><body>Cloudflare</body></html>")));

        let scraper = FillerListScraper::new(Arc::new(mock_http));
        let result = scraper.fetch_candidates().await;

        assert!(matches!(result, Err(BridgeError::Parse(_))));
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection refused".to_string())));

        let scraper = FillerListScraper::new(Arc::new(mock_http));
        let result = scraper.fetch_candidates().await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(ref m)) if m == "connection refused"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut healthy = MockHttpClient::new();
        healthy.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Head);
            Ok(response(200, ""))
        });
        assert!(FillerListScraper::new(Arc::new(healthy)).health_check().await);

        let mut down = MockHttpClient::new();
        down.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("timeout".to_string())));
        assert!(!FillerListScraper::new(Arc::new(down)).health_check().await);
    }

    #[test]
    fn test_defaults() {
        let scraper = FillerListScraper::new(Arc::new(MockHttpClient::new()));
        assert_eq!(scraper.url(), DEFAULT_FILLER_LIST_URL);
        assert_eq!(scraper.timeout, Duration::from_secs(30));
    }
}
