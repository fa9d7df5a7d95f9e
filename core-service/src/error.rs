use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Arc {0} does not exist")]
    ArcNotFound(i64),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    /// A fatal run failure; the partial stats travel with it
    #[error("Sync failed: {0}")]
    SyncFailed(#[from] core_sync::SyncFailure),
}

impl CoreError {
    /// Partial stats of a failed run, if this is one
    pub fn sync_stats(&self) -> Option<&core_sync::SyncStats> {
        match self {
            CoreError::SyncFailed(failure) => Some(&failure.stats),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
