//! Episode API response types

use bridge_traits::RawCandidate;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Episode as returned by `/episodes/en` and `/episodes/en/{id}`
///
/// Every field is optional; the API has shipped entries with missing arcs,
/// empty dates and null titles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiEpisode {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Formatted number, e.g. `"n°1"`
    pub number: Option<String>,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub arc: Option<ApiArc>,
    pub saga: Option<ApiSaga>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiArc {
    pub id: Option<i64>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiSaga {
    pub id: Option<i64>,
    pub title: Option<String>,
    /// Episode span as text, e.g. `"1-61"`
    pub saga_episode: Option<String>,
}

impl ApiEpisode {
    /// Decode one listing entry without ever failing
    ///
    /// An entry that does not match the expected shape keeps whatever `id`
    /// and `title` can be read from it.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<ApiEpisode>(value.clone()) {
            Ok(episode) => episode,
            Err(e) => {
                let id = value.get("id").and_then(Value::as_i64);
                warn!(episode_id = ?id, error = %e, "Malformed episode entry");
                ApiEpisode {
                    id,
                    title: value.get("title").and_then(Value::as_str).map(str::to_string),
                    ..ApiEpisode::default()
                }
            }
        }
    }

    pub fn arc_title(&self) -> Option<&str> {
        self.arc.as_ref().and_then(|arc| arc.title.as_deref())
    }

    pub fn saga_title(&self) -> Option<&str> {
        self.saga.as_ref().and_then(|saga| saga.title.as_deref())
    }

    fn parsed_release_date(&self) -> Option<NaiveDate> {
        let text = self.release_date.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                warn!(episode_id = ?self.id, release_date = %text, "Unparseable release date");
                None
            }
        }
    }
}

impl From<ApiEpisode> for RawCandidate {
    fn from(episode: ApiEpisode) -> Self {
        let release_date = episode.parsed_release_date();
        RawCandidate {
            id: episode.id,
            title: episode.title,
            release_date,
        }
    }
}
