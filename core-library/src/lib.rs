//! # Episode Store
//!
//! Owns the persisted episode and arc tables and provides repository patterns
//! for data access.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite connection pool and embedded migrations
//! - The typed record pipeline (`ValidatedCandidate` → `PersistedRecord`)
//! - Repositories for episodes and arcs with pagination

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{ArcRange, EpisodeWithArc, PersistedRecord, ValidatedCandidate, FALLBACK_ARC_NAME};
