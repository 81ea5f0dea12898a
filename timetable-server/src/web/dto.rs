//! Request and response types for the JSON API.

use serde::{Deserialize, Serialize};

use crate::domain::{Schedule, Station};
use crate::refresh::{RefreshOutcome, RefreshStage};
use crate::store::Review;

/// A station in API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationResult {
    pub id: u32,
    pub stasiun_name: String,
}

impl From<&Station> for StationResult {
    fn from(station: &Station) -> Self {
        Self {
            id: station.id,
            stasiun_name: station.name.clone(),
        }
    }
}

/// A departure in API responses. `jadwal` is `HH:MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub id: i64,
    pub station_id: i64,
    pub stasiun_name: String,
    pub arah: String,
    pub jadwal: String,
}

impl From<&Schedule> for ScheduleResult {
    fn from(schedule: &Schedule) -> Self {
        Self {
            id: schedule.id,
            station_id: schedule.station_id,
            stasiun_name: schedule.station_name.clone(),
            arah: schedule.direction.clone(),
            jadwal: schedule.departure.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub id: i64,
    pub user_id: i64,
    pub rating: f64,
    pub comment: String,
    /// RFC 3339
    pub created_at: String,
}

impl From<&Review> for ReviewResult {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: review.created_at.to_rfc3339(),
        }
    }
}

/// Last refresh cycle and what is running now.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatusResponse {
    pub running: bool,
    pub stage: String,
    pub last_run: Option<LastRunResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LastRunResult {
    Succeeded {
        stations_loaded: u64,
        duplicate_stations: u64,
        schedules_loaded: u64,
        extract_errors: usize,
        source_failed: bool,
        finished_at: String,
    },
    Failed {
        stage: String,
        error: String,
        at: String,
    },
}

impl RefreshStatusResponse {
    pub fn new(stage: RefreshStage, last: Option<&RefreshOutcome>) -> Self {
        Self {
            running: stage != RefreshStage::Idle,
            stage: stage.to_string(),
            last_run: last.map(LastRunResult::from),
        }
    }
}

impl From<&RefreshOutcome> for LastRunResult {
    fn from(outcome: &RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Succeeded(report) => LastRunResult::Succeeded {
                stations_loaded: report.stations_loaded,
                duplicate_stations: report.duplicate_stations,
                schedules_loaded: report.schedules_loaded,
                extract_errors: report.extract_errors,
                source_failed: report.source_failed,
                finished_at: report.finished_at.to_rfc3339(),
            },
            RefreshOutcome::Failed { stage, error, at } => LastRunResult::Failed {
                stage: stage.to_string(),
                error: error.clone(),
                at: at.to_rfc3339(),
            },
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
