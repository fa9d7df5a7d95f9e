//! Error types for the episode API provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpisodeApiError {
    /// API request returned an error status
    #[error("Episode API error (status {status_code}): {url}")]
    Http { status_code: u16, url: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Every per-id request failed, so the range produced nothing
    #[error("Episode API unavailable: all {failed} of {requested} episode requests failed")]
    Unavailable { failed: usize, requested: u64 },

    /// Id range wider than a single run may fetch
    #[error("Id range {range} covers {len} ids, at most {max} allowed")]
    RangeTooLarge { range: String, len: u64, max: u64 },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, EpisodeApiError>;

impl From<EpisodeApiError> for BridgeError {
    fn from(error: EpisodeApiError) -> Self {
        match error {
            EpisodeApiError::Http { status_code, url } => {
                BridgeError::OperationFailed(format!("HTTP {} from {}", status_code, url))
            }
            EpisodeApiError::Parse(msg) => BridgeError::Parse(msg),
            e @ EpisodeApiError::Unavailable { .. } => BridgeError::OperationFailed(e.to_string()),
            e @ EpisodeApiError::RangeTooLarge { .. } => BridgeError::NotAvailable(e.to_string()),
            EpisodeApiError::Bridge(e) => e,
        }
    }
}
