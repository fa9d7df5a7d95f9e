//! Core service façade and bootstrap helpers.
//!
//! This crate wires configuration into the shared sync core: it opens the
//! SQLite store, builds the HTTP client from `bridge-desktop` and the source
//! selected by [`AppConfig::source`](core_runtime::AppConfig), then exposes
//! sync, status and health operations over them.
//!
//! Each source lives behind a cargo feature (`filler-list`, `episode-api`,
//! both on by default). Selecting a source that was compiled out fails with
//! [`CoreError::CapabilityMissing`].
//!
//! ```ignore
//! use core_service::SyncService;
//! use core_runtime::AppConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! let service = SyncService::bootstrap(AppConfig::from_env()?).await?;
//! let stats = service.sync(CancellationToken::new(), false).await?;
//! service.close().await;
//! ```

pub mod error;
pub mod service;

pub use error::{CoreError, Result};
pub use service::{ArcCoverage, HealthReport, StatusReport, SyncService};

pub use core_library::repositories::{Page, PageRequest};
pub use core_library::{EpisodeWithArc, PersistedRecord};
