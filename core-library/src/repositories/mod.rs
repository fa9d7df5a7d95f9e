//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for data access.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository so the sync engine can be
//!   tested against in-process fakes
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//! - Pagination is supported via the `Page<T>` wrapper
//!
//! ## Available Repositories
//!
//! - `EpisodeRepository` - Episodes with paged id scans and batch upserts
//! - `ArcRepository` - Read-only arc ranges including the fallback row

pub mod arc;
pub mod episode;
pub mod pagination;

pub use arc::{ArcRepository, SqliteArcRepository};
pub use episode::{EpisodeRepository, SqliteEpisodeRepository};
pub use pagination::{Page, PageRequest};
