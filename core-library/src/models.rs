//! Domain models for the episode store
//!
//! Records move through three shapes. `RawCandidate` (from `bridge-traits`) is
//! whatever a source extracted. `ValidatedCandidate` has a guaranteed id and a
//! non-empty title. `PersistedRecord` adds the arc assignment and the
//! store-owned timestamps.

use bridge_traits::RawCandidate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{LibraryError, Result};

/// Reserved arc name that marks the fallback row
pub const FALLBACK_ARC_NAME: &str = "Unknown Arc";

/// Storage format of `episodes.release_date`
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Record Pipeline
// =============================================================================

/// A candidate whose id and title have been checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedCandidate {
    pub id: i64,
    /// Trimmed, never empty
    pub title: String,
    pub release_date: Option<NaiveDate>,
}

impl TryFrom<RawCandidate> for ValidatedCandidate {
    type Error = LibraryError;

    fn try_from(raw: RawCandidate) -> Result<Self> {
        let id = raw
            .id
            .ok_or_else(|| LibraryError::invalid_input("id", "episode id is missing"))?;

        let title = raw
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LibraryError::invalid_input("title", "episode title is empty"))?
            .to_string();

        Ok(Self {
            id,
            title,
            release_date: raw.release_date,
        })
    }
}

/// An episode as written to and read back from the store
///
/// Timestamps are `None` until the store assigns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: i64,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub arc_id: Option<i64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl PersistedRecord {
    pub fn from_candidate(candidate: ValidatedCandidate, arc_id: Option<i64>) -> Self {
        Self {
            id: candidate.id,
            title: candidate.title,
            release_date: candidate.release_date,
            arc_id,
            created_at: None,
            updated_at: None,
        }
    }

    /// Release date in its stored text form
    pub fn release_date_text(&self) -> Option<String> {
        self.release_date
            .map(|d| d.format(RELEASE_DATE_FORMAT).to_string())
    }
}

/// An episode joined with the name of its arc
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeWithArc {
    #[serde(flatten)]
    pub episode: PersistedRecord,
    pub arc_name: Option<String>,
}

// =============================================================================
// Arcs
// =============================================================================

/// A named, inclusive episode id range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ArcRange {
    pub arc_id: i64,
    pub name: String,
    pub start_episode: i64,
    pub end_episode: i64,
    pub description: Option<String>,
}

impl ArcRange {
    pub fn new(arc_id: i64, name: impl Into<String>, start_episode: i64, end_episode: i64) -> Self {
        Self {
            arc_id,
            name: name.into(),
            start_episode,
            end_episode,
            description: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.name == FALLBACK_ARC_NAME
    }

    /// Inclusive containment. The fallback row never contains anything.
    pub fn contains(&self, episode_id: i64) -> bool {
        !self.is_fallback() && self.start_episode <= episode_id && episode_id <= self.end_episode
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Arc name cannot be empty".to_string());
        }
        if self.start_episode > self.end_episode {
            return Err(format!(
                "Arc '{}' starts at {} after it ends at {}",
                self.name, self.start_episode, self.end_episode
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct EpisodeRow {
    pub id: i64,
    pub title: String,
    pub release_date: Option<String>,
    pub arc_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<EpisodeRow> for PersistedRecord {
    type Error = LibraryError;

    fn try_from(row: EpisodeRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            release_date: parse_release_date(row.release_date.as_deref())?,
            arc_id: row.arc_id,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EpisodeWithArcRow {
    #[sqlx(flatten)]
    pub episode: EpisodeRow,
    pub arc_name: Option<String>,
}

impl TryFrom<EpisodeWithArcRow> for EpisodeWithArc {
    type Error = LibraryError;

    fn try_from(row: EpisodeWithArcRow) -> Result<Self> {
        Ok(Self {
            episode: row.episode.try_into()?,
            arc_name: row.arc_name,
        })
    }
}

fn parse_release_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::parse_from_str(text, RELEASE_DATE_FORMAT).map_err(|e| {
                LibraryError::invalid_input("release_date", format!("'{}': {}", text, e))
            })
        })
        .transpose()
}
