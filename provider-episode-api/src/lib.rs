//! # Episode API Provider
//!
//! Implements `EpisodeSource` for a JSON episode API.
//!
//! ## Overview
//!
//! This module provides:
//! - Listing mode: one request for the whole episode list
//! - Per-id mode: an inclusive id range fetched with bounded concurrency
//! - Lenient decoding, so a malformed entry never drops its neighbours

pub mod connector;
pub mod error;
pub mod types;

pub use connector::EpisodeApiSource;
pub use error::{EpisodeApiError, Result};
pub use types::ApiEpisode;
