//! Turning the timetable page into records.
//!
//! Everything here is pure: a parsed document goes in, records and the
//! per-element errors that were skipped come out.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::{ScheduleEntry, Station};

use super::error::ExtractError;

static STATION_OPTIONS: LazyLock<Selector> = LazyLock::new(|| selector("select#fareFrom option"));
static SCHEDULE_ROWS: LazyLock<Selector> = LazyLock::new(|| selector(".row-jadwal"));
static DIRECTION_PANELS: LazyLock<Selector> = LazyLock::new(|| selector("div.col-12.col-xl-6"));
static DIRECTION_HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h3"));
static DEPARTURE_TIMES: LazyLock<Selector> = LazyLock::new(|| selector("ul#schedule-b span"));

static ROW_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"row-(\d+)").expect("row id pattern is valid"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

/// Records pulled from the page along with the elements that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<T> {
    pub records: Vec<T>,
    pub errors: Vec<ExtractError>,
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> Extraction<T> {
    /// Fold another extraction into this one, keeping document order.
    pub fn absorb(&mut self, other: Extraction<T>) {
        self.records.extend(other.records);
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Identity shared by every departure in one schedule row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHeader {
    pub station_id: Option<u32>,
    pub station_name: String,
}

/// Build a station from one `<option>` of the station picker.
pub fn station_from_option(option: ElementRef<'_>) -> Result<Station, ExtractError> {
    let name = element_text(option);
    let value = option.value().attr("value").unwrap_or_default().trim();

    let id = value
        .parse::<u32>()
        .map_err(|_| ExtractError::InvalidStationId {
            value: value.to_string(),
            name: name.clone(),
        })?;

    Ok(Station { id, name })
}

/// Read the station id and name carried on a `.row-jadwal` element.
///
/// The id lives in a `row-N` class token; the name in `data-stasiun`, which
/// is blank for the weekend variant. A missing token gives no id; a token
/// too large for a `u32` is an error.
pub fn row_header(row: ElementRef<'_>) -> Result<RowHeader, ExtractError> {
    let station_name = row
        .value()
        .attr("data-stasiun")
        .unwrap_or_default()
        .trim()
        .to_string();

    let station_id = match row
        .value()
        .attr("class")
        .and_then(|classes| ROW_ID.captures(classes))
        .and_then(|caps| caps.get(1))
    {
        Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| ExtractError::InvalidRowId {
            value: m.as_str().to_string(),
        })?),
        None => None,
    };

    Ok(RowHeader {
        station_id,
        station_name,
    })
}

/// Emit one entry per departure listed in a direction panel.
pub fn direction_panel(
    panel: ElementRef<'_>,
    index: usize,
    header: &RowHeader,
) -> Result<Vec<ScheduleEntry>, ExtractError> {
    let direction = panel
        .select(&DIRECTION_HEADING)
        .map(element_text)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    if direction.is_empty() {
        return Err(ExtractError::MissingDirection {
            station: header.station_id,
            panel: index,
        });
    }

    Ok(panel
        .select(&DEPARTURE_TIMES)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .map(|departure| ScheduleEntry {
            station_id: header.station_id,
            station_name: header.station_name.clone(),
            direction: direction.clone(),
            departure,
        })
        .collect())
}

/// Extract every departure in one `.row-jadwal` element.
///
/// A panel with a missing heading is skipped and reported; the remaining
/// panels of the row still contribute. A row whose id cannot be read
/// contributes nothing.
pub fn schedule_row(row: ElementRef<'_>) -> Extraction<ScheduleEntry> {
    let mut out = Extraction::default();
    let header = match row_header(row) {
        Ok(header) => header,
        Err(e) => {
            out.errors.push(e);
            return out;
        }
    };
    let mut panels = 0;

    for (index, panel) in row.select(&DIRECTION_PANELS).enumerate() {
        panels += 1;
        match direction_panel(panel, index, &header) {
            Ok(entries) => out.records.extend(entries),
            Err(e) => out.errors.push(e),
        }
    }

    if panels == 0 {
        out.errors.push(ExtractError::NoDirectionPanels {
            station: header.station_id,
        });
    }

    out
}

/// All stations in the picker, in document order.
pub fn extract_stations(document: &Html) -> Extraction<Station> {
    let mut out = Extraction::default();
    for option in document.select(&STATION_OPTIONS) {
        match station_from_option(option) {
            Ok(station) => out.records.push(station),
            Err(e) => out.errors.push(e),
        }
    }
    out
}

/// All departures on the page, row by row.
pub fn extract_schedules(document: &Html) -> Extraction<ScheduleEntry> {
    let mut out = Extraction::default();
    for row in document.select(&SCHEDULE_ROWS) {
        out.absorb(schedule_row(row));
    }
    out
}

/// Trimmed, whitespace-collapsed text content of an element.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
