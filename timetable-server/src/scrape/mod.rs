//! Scraping the departure timetable page.
//!
//! The page carries two things we need: a station picker
//! (`select#fareFrom`) and one `.row-jadwal` block per station and day type,
//! each holding a panel per direction with the departure times.

mod client;
mod error;
pub mod extract;

pub use client::{
    DEFAULT_SOURCE_URL, PageSource, ScrapeOutput, TimetableClient, TimetableClientConfig,
};
pub use error::{ExtractError, ScrapeError};
pub use extract::{Extraction, RowHeader};
