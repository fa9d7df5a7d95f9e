//! Episode table parsing
//!
//! The show page carries one `table.EpisodeList` with a header row followed by
//! one row per episode:
//!
//! ```html
//! <tr class="mixed_canon/filler even">
//!   <td class="Number">1</td>
//!   <td class="Title"><a href="...">I&#039;m Luffy! The Man Who Will Become the Pirate King!</a></td>
//!   <td class="Type"><span>Manga Canon</span></td>
//!   <td class="Date">1999-10-20</td>
//! </tr>
//! ```

use crate::error::{FillerListError, Result};
use bridge_traits::RawCandidate;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Formats tried in order after the site's usual `%Y-%m-%d`
const FALLBACK_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y", "%Y.%m.%d"];

const UNKNOWN_DATES: &[&str] = &["tba", "tbd", "unknown", "-"];

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| FillerListError::Parse(format!("invalid selector {}: {:?}", css, e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse every episode row of the page
///
/// Every data row yields a candidate, so the run counts what the page held.
/// A row missing its Number or Date cell, or whose number does not parse,
/// comes back without an id, and a missing title yields one without a title;
/// validation rejects both downstream.
///
/// # Errors
///
/// Returns [`FillerListError::Parse`] when the table is missing or has no
/// data rows.
pub fn parse_episode_table(html: &str) -> Result<Vec<RawCandidate>> {
    let document = Html::parse_document(html);

    let table_selector = selector("table.EpisodeList")?;
    let row_selector = selector("tr")?;
    let number_selector = selector("td.Number")?;
    let title_selector = selector("td.Title")?;
    let link_selector = selector("a")?;
    let date_selector = selector("td.Date")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| FillerListError::Parse("could not find EpisodeList table".to_string()))?;

    let rows: Vec<ElementRef<'_>> = table.select(&row_selector).skip(1).collect();
    if rows.is_empty() {
        return Err(FillerListError::Parse(
            "no episode rows found in table".to_string(),
        ));
    }

    let mut candidates = Vec::with_capacity(rows.len());
    let mut malformed = 0usize;

    for (index, row) in rows.into_iter().enumerate() {
        let number_cell = row.select(&number_selector).next();
        let date_cell = row.select(&date_selector).next();

        let id = match (number_cell, date_cell) {
            (None, _) => {
                warn!(row = index + 1, "Row has no Number cell");
                None
            }
            (Some(_), None) => {
                warn!(row = index + 1, "Row has no Date cell");
                None
            }
            (Some(cell), Some(_)) => {
                let number_text = cell_text(cell);
                match number_text.parse::<i64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(row = index + 1, number = %number_text, "Unparseable episode number");
                        None
                    }
                }
            }
        };
        if id.is_none() {
            malformed += 1;
        }

        let title = row.select(&title_selector).next().map(|cell| {
            let text = match cell.select(&link_selector).next() {
                Some(link) => cell_text(link),
                None => cell_text(cell),
            };
            // Some rows come back double-encoded.
            text.replace("&#039;", "'")
        });

        candidates.push(RawCandidate {
            id,
            title,
            release_date: date_cell.and_then(|cell| parse_airdate(&cell_text(cell))),
        });
    }

    debug!(parsed = candidates.len(), malformed, "Parsed episode table");
    Ok(candidates)
}

/// Parse an airdate cell, `None` for placeholders and unknown formats
pub fn parse_airdate(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() || UNKNOWN_DATES.contains(&text.to_lowercase().as_str()) {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }

    let parsed = FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok());

    if parsed.is_none() {
        warn!(airdate = %text, "Could not parse airdate");
    }
    parsed
}
