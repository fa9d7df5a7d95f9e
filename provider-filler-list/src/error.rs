//! Error types for the filler list provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FillerListError {
    /// The page request returned a non-success status
    #[error("Filler list request failed (status {status_code}): {url}")]
    Http { status_code: u16, url: String },

    /// The page did not contain a usable episode table
    #[error("Failed to parse episode table: {0}")]
    Parse(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, FillerListError>;

impl From<FillerListError> for BridgeError {
    fn from(error: FillerListError) -> Self {
        match error {
            FillerListError::Http { status_code, url } => BridgeError::OperationFailed(format!(
                "HTTP {} while fetching {}",
                status_code, url
            )),
            FillerListError::Parse(msg) => BridgeError::Parse(msg),
            FillerListError::Bridge(e) => e,
        }
    }
}
