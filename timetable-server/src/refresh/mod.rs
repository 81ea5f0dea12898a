//! The scrape-to-store refresh cycle.
//!
//! One cycle cleans old staging files, scrapes the timetable page, stages
//! both record sets as CSV, wipes the destination tables and reloads them from
//! the staged files. A failing stage abandons the cycle; nothing is rolled
//! back, so readers may briefly see an empty or half-loaded store.

mod error;
mod scheduler;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::cache::QueryCache;
use crate::domain::Clock;
use crate::scrape::{PageSource, ScrapeOutput};
use crate::staging::Staging;
use crate::store::Store;

pub use error::{RefreshError, RefreshStage, StageError};
pub use scheduler::{next_midnight, run_daily};

#[derive(Debug, Clone, Default)]
pub struct RefreshConfig {
    /// Staged CSV files older than this are deleted at the start of a cycle.
    pub csv_retention: Duration,
}

impl RefreshConfig {
    pub fn with_csv_retention(mut self, retention: Duration) -> Self {
        self.csv_retention = retention;
        self
    }
}

/// Counts from a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub files_cleaned: usize,
    /// The page could not be fetched and empty record sets were staged.
    pub source_failed: bool,
    pub extract_errors: usize,
    pub stations_loaded: u64,
    /// Station rows skipped because their id was already loaded.
    pub duplicate_stations: u64,
    pub schedules_loaded: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// How the most recent cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Succeeded(RefreshReport),
    Failed {
        stage: RefreshStage,
        error: String,
        at: DateTime<Utc>,
    },
}

/// Runs refresh cycles, one at a time.
pub struct Refresher {
    source: PageSource,
    staging: Staging,
    store: Store,
    cache: Option<QueryCache>,
    config: RefreshConfig,
    clock: Arc<dyn Clock>,
    run_lock: tokio::sync::Mutex<()>,
    stage: Mutex<RefreshStage>,
    last: Mutex<Option<RefreshOutcome>>,
}

impl Refresher {
    pub fn new(
        source: PageSource,
        staging: Staging,
        store: Store,
        config: RefreshConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            staging,
            store,
            cache: None,
            config,
            clock,
            run_lock: tokio::sync::Mutex::new(()),
            stage: Mutex::new(RefreshStage::Idle),
            last: Mutex::new(None),
        }
    }

    /// Invalidate `cache` after every successful cycle.
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The stage the running cycle is in, or `Idle`.
    pub fn current_stage(&self) -> RefreshStage {
        *self.stage.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_run(&self) -> Option<RefreshOutcome> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn enter(&self, stage: RefreshStage) {
        *self.stage.lock().unwrap_or_else(|e| e.into_inner()) = stage;
        if stage != RefreshStage::Idle {
            info!(stage = %stage, "Refresh stage started");
        }
    }

    fn record(&self, outcome: RefreshOutcome) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
    }

    /// Run one full cycle.
    ///
    /// Returns [`RefreshError::AlreadyRunning`] without doing anything if
    /// another cycle holds the run-lock.
    pub async fn run_once(&self) -> Result<RefreshReport, RefreshError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| RefreshError::AlreadyRunning)?;

        let started_at = self.clock.now();
        info!("Running timetable refresh");

        let result = self.run_stages(started_at).await;
        self.enter(RefreshStage::Idle);

        match &result {
            Ok(report) => {
                info!(
                    stations = report.stations_loaded,
                    duplicate_stations = report.duplicate_stations,
                    schedules = report.schedules_loaded,
                    extract_errors = report.extract_errors,
                    source_failed = report.source_failed,
                    "Refresh completed"
                );
                if let Some(cache) = &self.cache {
                    cache.invalidate_all();
                }
                self.record(RefreshOutcome::Succeeded(report.clone()));
            }
            Err(e) => {
                error!(error = %e, "Refresh abandoned");
                self.record(RefreshOutcome::Failed {
                    stage: e.stage().unwrap_or(RefreshStage::Idle),
                    error: e.to_string(),
                    at: self.clock.now(),
                });
            }
        }

        result
    }

    async fn run_stages(&self, started_at: DateTime<Utc>) -> Result<RefreshReport, RefreshError> {
        self.enter(RefreshStage::CleaningOldFiles);
        let files_cleaned = self
            .staging
            .cleanup_older_than(self.config.csv_retention)
            .map_err(RefreshError::at(RefreshStage::CleaningOldFiles))?;

        self.enter(RefreshStage::Scraping);
        let (output, source_failed) = self.scrape().await;
        for e in output.stations.errors.iter().chain(&output.schedules.errors) {
            warn!(error = %e, "Skipped page element");
        }

        self.enter(RefreshStage::Staging);
        self.staging
            .write_stations(&output.stations.records)
            .map_err(RefreshError::at(RefreshStage::Staging))?;
        self.staging
            .write_schedules(&output.schedules.records)
            .map_err(RefreshError::at(RefreshStage::Staging))?;

        self.enter(RefreshStage::WipingDestination);
        self.store.ping().await.map_err(RefreshError::at(RefreshStage::WipingDestination))?;
        self.store
            .delete_all_schedules()
            .await
            .map_err(RefreshError::at(RefreshStage::WipingDestination))?;
        self.store
            .delete_all_stations()
            .await
            .map_err(RefreshError::at(RefreshStage::WipingDestination))?;

        self.enter(RefreshStage::Loading);
        let stations = self.staging.read_stations().map_err(RefreshError::at(RefreshStage::Loading))?;
        let stations_loaded = self
            .store
            .insert_stations(&stations)
            .await
            .map_err(RefreshError::at(RefreshStage::Loading))?;

        let schedules = self.staging.read_schedules().map_err(RefreshError::at(RefreshStage::Loading))?;
        let schedules_loaded = self
            .store
            .insert_schedules(&schedules)
            .await
            .map_err(RefreshError::at(RefreshStage::Loading))?;

        Ok(RefreshReport {
            files_cleaned,
            source_failed,
            extract_errors: output.error_count(),
            stations_loaded,
            duplicate_stations: stations.len() as u64 - stations_loaded,
            schedules_loaded,
            started_at,
            finished_at: self.clock.now(),
        })
    }

    /// Scrape the page, falling back to empty record sets if it is unreachable.
    async fn scrape(&self) -> (ScrapeOutput, bool) {
        match self.source.scrape().await {
            Ok(output) => {
                info!(
                    stations = output.stations.records.len(),
                    schedules = output.schedules.records.len(),
                    "Scraping completed"
                );
                (output, false)
            }
            Err(e) => {
                warn!(error = %e, "Timetable page unavailable, staging empty data");
                (ScrapeOutput::default(), true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ManualClock;
    use chrono::TimeZone;

    const PAGE: &str = r#"
        <select id="fareFrom">
          <option value="1">Lebak Bulus Grab</option>
          <option value="1">Lebak Bulus Grab</option>
        </select>
        <div class="row-jadwal row-1" data-stasiun="Lebak Bulus Grab">
          <div class="col-12 col-xl-6"><h3>Bundaran HI</h3>
            <ul id="schedule-b"><span>05:00</span><span>05:10</span></ul></div>
        </div>
    "#;

    async fn refresher(source: PageSource, dir: &std::path::Path) -> Refresher {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 17, 0, 0).unwrap(),
        ));
        Refresher::new(
            source,
            Staging::new(dir),
            store,
            RefreshConfig::default(),
            clock,
        )
    }

    #[tokio::test]
    async fn cycle_counts_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = refresher(PageSource::from_html(PAGE), dir.path()).await;

        let report = refresher.run_once().await.unwrap();
        assert_eq!(report.stations_loaded, 1);
        assert_eq!(report.duplicate_stations, 1);
        assert_eq!(report.schedules_loaded, 2);
        assert!(!report.source_failed);

        assert_eq!(refresher.current_stage(), RefreshStage::Idle);
        assert_eq!(refresher.last_run(), Some(RefreshOutcome::Succeeded(report)));
    }

    #[tokio::test]
    async fn malformed_staged_time_fails_loading() {
        let dir = tempfile::tempdir().unwrap();
        let page = PAGE.replace("05:10", "5:1");
        let refresher = refresher(PageSource::from_html(page), dir.path()).await;

        let err = refresher.run_once().await.unwrap_err();
        assert_eq!(err.stage(), Some(RefreshStage::Loading));
        assert!(matches!(
            err,
            RefreshError::Failed {
                source: StageError::Staging(_),
                ..
            }
        ));
        assert!(matches!(
            refresher.last_run(),
            Some(RefreshOutcome::Failed {
                stage: RefreshStage::Loading,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unreachable_source_stages_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let client = crate::scrape::TimetableClient::new(
            crate::scrape::TimetableClientConfig::new("http://127.0.0.1:9/jadwal").with_timeout(2),
        )
        .unwrap();
        let refresher = refresher(PageSource::Http(client), dir.path()).await;

        let report = refresher.run_once().await.unwrap();
        assert!(report.source_failed);
        assert_eq!(report.stations_loaded, 0);
        assert_eq!(report.schedules_loaded, 0);
        assert!(dir.path().join(crate::staging::STATIONS_FILE).exists());
    }

    #[tokio::test]
    async fn closed_store_fails_at_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = refresher(PageSource::from_html(PAGE), dir.path()).await;
        refresher.store.pool().close().await;

        let err = refresher.run_once().await.unwrap_err();
        assert_eq!(err.stage(), Some(RefreshStage::WipingDestination));
        assert!(matches!(
            err,
            RefreshError::Failed {
                source: StageError::Store(crate::store::StoreError::Unavailable(_)),
                ..
            }
        ));
        assert!(matches!(
            refresher.last_run(),
            Some(RefreshOutcome::Failed {
                stage: RefreshStage::WipingDestination,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = refresher(PageSource::from_html(PAGE), dir.path()).await;

        let _held = refresher.run_lock.lock().await;
        assert!(matches!(
            refresher.run_once().await,
            Err(RefreshError::AlreadyRunning)
        ));
        assert_eq!(refresher.last_run(), None);
    }
}
