//! Episode Source Abstraction
//!
//! Contract between the sync engine and anything that can observe the
//! authoritative episode list (an HTML table, a JSON API, a fixture).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An episode as observed by a source, before any validation
///
/// Every field is optional because sources are allowed to hand back
/// whatever they managed to extract; narrowing happens downstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawCandidate {
    /// Source-assigned episode number
    pub id: Option<i64>,
    /// Episode title as scraped, not yet trimmed
    pub title: Option<String>,
    /// Original air date, when the source exposes a parseable one
    pub release_date: Option<NaiveDate>,
}

impl RawCandidate {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            title: Some(title.into()),
            release_date: None,
        }
    }

    pub fn with_release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }
}

/// A finite, restartable producer of episode candidates
///
/// # Example
///
/// ```ignore
/// use bridge_traits::source::EpisodeSource;
///
/// async fn count(source: &dyn EpisodeSource) -> Result<usize> {
///     Ok(source.fetch_candidates().await?.len())
/// }
/// ```
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    /// Short identifier used in logs and run history
    fn name(&self) -> &str;

    /// Fetch the complete candidate list
    ///
    /// # Errors
    ///
    /// Any error is terminal for the whole sequence; callers do not expect
    /// a partial list alongside a failure.
    async fn fetch_candidates(&self) -> Result<Vec<RawCandidate>>;

    /// Check whether the source is reachable
    async fn health_check(&self) -> bool {
        true
    }
}
