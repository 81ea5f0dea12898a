//! Fetching the timetable page.

use std::path::{Path, PathBuf};

use scraper::Html;
use tracing::{debug, info};

use crate::domain::{ScheduleEntry, Station};

use super::error::ScrapeError;
use super::extract::{Extraction, extract_schedules, extract_stations};

/// Default page listing every station's departures.
pub const DEFAULT_SOURCE_URL: &str = "https://jakartamrt.co.id/id/jadwal-keberangkatan-mrt?dari=null";

/// Configuration for the timetable HTTP client.
#[derive(Debug, Clone)]
pub struct TimetableClientConfig {
    /// Page to scrape
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TimetableClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for TimetableClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_URL)
    }
}

/// HTTP client for the timetable page.
#[derive(Debug, Clone)]
pub struct TimetableClient {
    http: reqwest::Client,
    url: String,
}

impl TimetableClient {
    pub fn new(config: TimetableClientConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url,
        })
    }

    /// Fetch the raw page body.
    pub async fn fetch_page(&self) -> Result<String, ScrapeError> {
        info!(url = %self.url, "Visiting timetable page");

        let response = self.http.get(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = response.text().await?;
        debug!(url = %self.url, bytes = body.len(), "Page visited");
        Ok(body)
    }
}

/// Where the refresh cycle gets its page from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// The live site
    Http(TimetableClient),
    /// A saved copy of the page, for offline runs and tests
    Static { body: String, origin: PathBuf },
}

impl PageSource {
    /// Serve a saved page from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScrapeError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|source| ScrapeError::File {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::Static {
            body,
            origin: path.to_path_buf(),
        })
    }

    /// Serve a page held in memory.
    pub fn from_html(body: impl Into<String>) -> Self {
        Self::Static {
            body: body.into(),
            origin: PathBuf::from("<memory>"),
        }
    }

    pub async fn fetch_page(&self) -> Result<String, ScrapeError> {
        match self {
            PageSource::Http(client) => client.fetch_page().await,
            PageSource::Static { body, origin } => {
                debug!(origin = %origin.display(), "Using static timetable page");
                Ok(body.clone())
            }
        }
    }

    /// Fetch the page and extract both record sets.
    pub async fn scrape(&self) -> Result<ScrapeOutput, ScrapeError> {
        let body = self.fetch_page().await?;
        Ok(ScrapeOutput::from_html(&body))
    }
}

/// Everything extracted from one visit to the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeOutput {
    pub stations: Extraction<Station>,
    pub schedules: Extraction<ScheduleEntry>,
}

impl ScrapeOutput {
    /// Parse a page body and extract stations and schedules.
    pub fn from_html(body: &str) -> Self {
        let document = Html::parse_document(body);
        Self {
            stations: extract_stations(&document),
            schedules: extract_schedules(&document),
        }
    }

    pub fn error_count(&self) -> usize {
        self.stations.errors.len() + self.schedules.errors.len()
    }
}
