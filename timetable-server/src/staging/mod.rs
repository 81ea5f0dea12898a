//! CSV staging files.
//!
//! Each refresh writes what it scraped to two CSV files and then loads the
//! store from those files, so the last scrape can always be inspected (or
//! replayed) on disk.

mod error;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::domain::{DepartureTime, LoadedSchedule, ScheduleEntry, Station};

pub use error::StagingError;

/// File name of the station list.
pub const STATIONS_FILE: &str = "listStasiun.csv";

/// File name of the departure list.
pub const SCHEDULES_FILE: &str = "stasiunSchedules.csv";

const STATIONS_HEADER: [&str; 2] = ["id", "stasiun"];
const SCHEDULES_HEADER: [&str; 4] = ["StasiunID", "StasiunName", "Arah", "Schedule"];

/// The staging directory and the two files inside it.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn stations_path(&self) -> PathBuf {
        self.dir.join(STATIONS_FILE)
    }

    pub fn schedules_path(&self) -> PathBuf {
        self.dir.join(SCHEDULES_FILE)
    }

    /// Create the staging directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), StagingError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StagingError::io(&self.dir, e))
    }

    /// Overwrite the station file.
    pub fn write_stations(&self, stations: &[Station]) -> Result<(), StagingError> {
        let path = self.stations_path();
        let mut writer = self.open_writer(&path, &STATIONS_HEADER)?;

        for station in stations {
            writer
                .write_record([station.id.to_string().as_str(), station.name.as_str()])
                .map_err(|e| StagingError::csv(&path, e))?;
            writer.flush().map_err(|e| StagingError::io(&path, e))?;
        }

        info!(path = %path.display(), rows = stations.len(), "Wrote station CSV");
        Ok(())
    }

    /// Overwrite the departure file.
    ///
    /// A missing station id is written as an empty field.
    pub fn write_schedules(&self, schedules: &[ScheduleEntry]) -> Result<(), StagingError> {
        let path = self.schedules_path();
        let mut writer = self.open_writer(&path, &SCHEDULES_HEADER)?;

        for entry in schedules {
            let id = entry.station_id.map(|id| id.to_string()).unwrap_or_default();
            writer
                .write_record([
                    id.as_str(),
                    entry.station_name.as_str(),
                    entry.direction.as_str(),
                    entry.departure.as_str(),
                ])
                .map_err(|e| StagingError::csv(&path, e))?;
            writer.flush().map_err(|e| StagingError::io(&path, e))?;
        }

        info!(path = %path.display(), rows = schedules.len(), "Wrote schedule CSV");
        Ok(())
    }

    /// Read the station file back.
    pub fn read_stations(&self) -> Result<Vec<Station>, StagingError> {
        let path = self.stations_path();
        read_rows(&path, STATIONS_HEADER.len(), |fields| {
            let id = fields[0]
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("station id {:?} is not a number", &fields[0]))?;
            Ok(Station::new(id, &fields[1]))
        })
    }

    /// Read the departure file back, validating every time.
    ///
    /// An empty station id loads as 0.
    pub fn read_schedules(&self) -> Result<Vec<LoadedSchedule>, StagingError> {
        let path = self.schedules_path();
        read_rows(&path, SCHEDULES_HEADER.len(), |fields| {
            let raw_id = fields[0].trim();
            let station_id = if raw_id.is_empty() {
                0
            } else {
                raw_id
                    .parse::<u32>()
                    .map_err(|_| format!("station id {raw_id:?} is not a number"))?
            };
            let departure = DepartureTime::parse_hhmm(fields[3].trim()).map_err(|e| e.to_string())?;

            Ok(LoadedSchedule {
                station_id,
                station_name: fields[1].to_string(),
                direction: fields[2].to_string(),
                departure,
            })
        })
    }

    /// Delete staged CSV files last modified more than `retention` ago.
    ///
    /// Files that cannot be inspected or removed are logged and skipped.
    /// Returns the number of files deleted.
    pub fn cleanup_older_than(&self, retention: Duration) -> Result<usize, StagingError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StagingError::io(&self.dir, e)),
        };

        let now = SystemTime::now();
        let mut deleted = 0;

        for entry in entries {
            let entry = entry.map_err(|e| StagingError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("csv") {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat staged file");
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= retention {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Deleted old CSV file");
                    deleted += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old CSV file"),
            }
        }

        Ok(deleted)
    }

    fn open_writer(&self, path: &Path, header: &[&str]) -> Result<csv::Writer<File>, StagingError> {
        self.ensure_dir()?;
        let file = File::create(path).map_err(|e| StagingError::io(path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(header)
            .map_err(|e| StagingError::csv(path, e))?;
        writer.flush().map_err(|e| StagingError::io(path, e))?;
        Ok(writer)
    }
}

/// Read every data row of a staged file through `parse`.
///
/// Stops at the first row that has the wrong number of fields or that
/// `parse` rejects.
fn read_rows<T>(
    path: &Path,
    columns: usize,
    parse: impl Fn(&csv::StringRecord) -> Result<T, String>,
) -> Result<Vec<T>, StagingError> {
    let file = File::open(path).map_err(|e| StagingError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StagingError::csv(path, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        if record.len() != columns {
            return Err(StagingError::malformed(
                path,
                line,
                format!("expected {columns} fields, found {}", record.len()),
            ));
        }

        let row = parse(&record).map_err(|reason| StagingError::malformed(path, line, reason))?;
        out.push(row);
    }

    Ok(out)
}
