//! Scraping error types.

/// Errors fetching the timetable page.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("source unreachable: {0}")]
    SourceUnreachable(#[from] reqwest::Error),

    /// The site answered with a non-success status
    #[error("source returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// A static page could not be read from disk
    #[error("failed to read page from {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single element on the page that could not be turned into a record.
///
/// These are collected rather than propagated; one bad row never stops
/// extraction of the rest of the page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// A station option whose value is not a numeric id
    #[error("station option {name:?} has non-numeric value {value:?}")]
    InvalidStationId { value: String, name: String },

    /// A `row-N` class token whose number does not fit a station id
    #[error("schedule row id {value:?} is out of range")]
    InvalidRowId { value: String },

    /// A schedule row without any direction panels
    #[error("schedule row for station {station:?} has no direction panels")]
    NoDirectionPanels { station: Option<u32> },

    /// A direction panel with an empty heading
    #[error("direction panel {panel} for station {station:?} has no heading")]
    MissingDirection { station: Option<u32>, panel: usize },
}
