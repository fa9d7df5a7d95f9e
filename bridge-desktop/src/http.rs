//! `HttpClient` over reqwest
//!
//! Each attempt either yields a response the caller should see or a reason to
//! try again. Rate limiting (429), 5xx statuses, timeouts and connect failures
//! are retried under the [`RetryPolicy`]; any other status, 404 included, is
//! returned as is.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("episode-sync/", env!("CARGO_PKG_VERSION"));

/// Longest `Retry-After` we are willing to honour
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Why an attempt produced no response for the caller
enum AttemptFailure {
    /// Worth another attempt; `wait` is a server-requested delay from `Retry-After`
    Retry {
        error: BridgeError,
        wait: Option<Duration>,
    },
    Fatal(BridgeError),
}

pub struct ReqwestHttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl ReqwestHttpClient {
    /// Client with a 30 second request timeout
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotAvailable`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::NotAvailable`] if the TLS backend cannot be
    /// initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Policy used by [`HttpClient::execute`]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let builder = request.headers.iter().fold(
            self.client.request(Self::method(request.method), &request.url),
            |builder, (key, value)| builder.header(key, value),
        );

        match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, AttemptFailure> {
        let response = self.build_request(request).send().await.map_err(|e| {
            let error =
                BridgeError::OperationFailed(format!("Request to {} failed: {}", request.url, e));
            if e.is_timeout() || e.is_connect() {
                AttemptFailure::Retry { error, wait: None }
            } else {
                AttemptFailure::Fatal(error)
            }
        })?;

        into_response(response).await
    }

    async fn send_with_policy(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, url = %request.url, "Executing HTTP request");

            let (error, wait) = match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(AttemptFailure::Fatal(error)) => return Err(error),
                Err(AttemptFailure::Retry { error, wait }) => (error, wait),
            };
            warn!(attempt, error = %error, url = %request.url, "HTTP attempt failed");

            if attempt < max_attempts {
                let delay = wait
                    .map(|wait| wait.min(MAX_RETRY_AFTER))
                    .unwrap_or_else(|| policy.delay_for(attempt));
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

async fn into_response(
    response: reqwest::Response,
) -> std::result::Result<HttpResponse, AttemptFailure> {
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
        .collect();

    if RetryPolicy::is_retryable_status(status) {
        let wait = headers
            .get("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AttemptFailure::Retry {
            error: BridgeError::OperationFailed(format!(
                "HTTP {} from {}",
                status,
                response.url()
            )),
            wait,
        });
    }

    let body = response.bytes().await.map_err(|e| AttemptFailure::Retry {
        error: BridgeError::OperationFailed(format!("Failed to read body: {}", e)),
        wait: None,
    })?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.send_with_policy(request, self.retry_policy.clone())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.send_with_policy(request, policy).await
    }
}
