//! # Filler List Provider
//!
//! Implements `EpisodeSource` by scraping the episode table of an
//! animefillerlist.com show page.
//!
//! ## Overview
//!
//! This module provides:
//! - Page fetching through the `HttpClient` bridge with browser-like headers
//! - Table parsing with `scraper`, tolerant of malformed rows
//! - Airdate parsing across the formats the site has used

pub mod connector;
pub mod error;
pub mod parser;

pub use connector::FillerListScraper;
pub use error::{FillerListError, Result};
pub use parser::{parse_airdate, parse_episode_table};
