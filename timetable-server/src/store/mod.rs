//! Relational store for stations, schedules and reviews.
//!
//! Backed by SQLite through sqlx. The refresh cycle replaces the station and
//! schedule tables wholesale; the read API only ever selects from them.

mod error;
mod reviews;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info};

use crate::domain::{DayVariant, DepartureTime, LoadedSchedule, Schedule, Station};

pub use error::StoreError;
pub use reviews::{NewReview, Review};

/// Maximum pooled connections for file-backed databases.
const MAX_CONNECTIONS: u32 = 5;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stations (
        id INTEGER PRIMARY KEY,
        stasiun_name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedules (
        id INTEGER PRIMARY KEY,
        station_id INTEGER NOT NULL,
        stasiun_name TEXT,
        arah TEXT NOT NULL,
        jadwal TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS schedules_station_arah ON schedules (station_id, arah)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users (id),
        rating REAL NOT NULL,
        comment TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

#[derive(sqlx::FromRow)]
struct StationRow {
    id: i64,
    stasiun_name: String,
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: i64,
    station_id: i64,
    stasiun_name: Option<String>,
    arah: String,
    jadwal: Option<String>,
}

impl TryFrom<StationRow> for Station {
    type Error = StoreError;

    fn try_from(row: StationRow) -> Result<Self, Self::Error> {
        let id = u32::try_from(row.id).map_err(|_| StoreError::InvalidRow {
            table: "stations",
            id: row.id,
            reason: "id out of range".into(),
        })?;
        Ok(Station::new(id, row.stasiun_name))
    }
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| StoreError::InvalidRow {
            table: "schedules",
            id: row.id,
            reason,
        };
        let raw = row
            .jadwal
            .as_deref()
            .ok_or_else(|| invalid("missing jadwal".into()))?;
        let departure = DepartureTime::parse_stored(raw).map_err(|e| invalid(e.to_string()))?;

        Ok(Schedule {
            id: row.id,
            station_id: row.station_id,
            station_name: row.stasiun_name.unwrap_or_default(),
            direction: row.arah,
            departure,
        })
    }
}

const SCHEDULE_COLUMNS: &str = "SELECT id, station_id, stasiun_name, arah, jadwal FROM schedules";

/// Handle to the destination database.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url`.
    ///
    /// `sqlite::memory:` URLs get a single long-lived connection so every
    /// query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(StoreError::Unavailable)?;

        info!(url, "Database connection established");
        Ok(Self { pool })
    }

    /// A private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::Unavailable)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create any missing tables.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database tables initialized");
        Ok(())
    }

    /// Check the database still answers.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Unavailable)?;
        Ok(())
    }

    /// Delete every schedule row. Returns the number removed.
    pub async fn delete_all_schedules(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM schedules").execute(&self.pool).await?;
        info!(rows = result.rows_affected(), "Deleted all schedules");
        Ok(result.rows_affected())
    }

    /// Delete every station row. Returns the number removed.
    pub async fn delete_all_stations(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM stations").execute(&self.pool).await?;
        info!(rows = result.rows_affected(), "Deleted all stations");
        Ok(result.rows_affected())
    }

    /// Insert stations in one transaction, skipping ids already present.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn insert_stations(&self, stations: &[Station]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for station in stations {
            let result = sqlx::query(
                "INSERT INTO stations (id, stasiun_name) VALUES (?, ?) ON CONFLICT (id) DO NOTHING",
            )
            .bind(i64::from(station.id))
            .bind(&station.name)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(id = station.id, name = %station.name, "Skipped duplicate station id");
            }
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Insert schedules in one transaction.
    pub async fn insert_schedules(&self, schedules: &[LoadedSchedule]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for schedule in schedules {
            let result = sqlx::query(
                "INSERT INTO schedules (station_id, stasiun_name, arah, jadwal) VALUES (?, ?, ?, ?)",
            )
            .bind(i64::from(schedule.station_id))
            .bind(&schedule.station_name)
            .bind(&schedule.direction)
            .bind(schedule.departure.to_stored())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn all_stations(&self) -> Result<Vec<Station>, StoreError> {
        let rows: Vec<StationRow> =
            sqlx::query_as("SELECT id, stasiun_name FROM stations ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Station::try_from).collect()
    }

    pub async fn all_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(&format!("{SCHEDULE_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Schedule::try_from).collect()
    }

    pub async fn schedules_by_station(&self, station_id: u32) -> Result<Vec<Schedule>, StoreError> {
        let rows: Vec<ScheduleRow> =
            sqlx::query_as(&format!("{SCHEDULE_COLUMNS} WHERE station_id = ? ORDER BY id"))
                .bind(i64::from(station_id))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Schedule::try_from).collect()
    }

    /// Schedules for one station and direction, restricted to a day variant.
    ///
    /// Weekend rows are the ones stored with a blank station name.
    pub async fn schedules_by_station_and_direction(
        &self,
        station_id: u32,
        direction: &str,
        variant: DayVariant,
    ) -> Result<Vec<Schedule>, StoreError> {
        let name_filter = match variant {
            DayVariant::Weekend => "TRIM(COALESCE(stasiun_name, '')) = ''",
            DayVariant::Weekday => "TRIM(COALESCE(stasiun_name, '')) <> ''",
        };
        let sql = format!(
            "{SCHEDULE_COLUMNS} WHERE station_id = ? AND arah = ? AND {name_filter} ORDER BY id"
        );

        let rows: Vec<ScheduleRow> = sqlx::query_as(&sql)
            .bind(i64::from(station_id))
            .bind(direction)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Schedule::try_from).collect()
    }

    pub async fn count_stations(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_schedules(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schedules")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    fn loaded(station_id: u32, name: &str, direction: &str, time: &str) -> LoadedSchedule {
        LoadedSchedule {
            station_id,
            station_name: name.into(),
            direction: direction.into(),
            departure: DepartureTime::parse_hhmm(time).unwrap(),
        }
    }

    #[tokio::test]
    async fn schema_init_is_repeatable() {
        let store = store().await;
        store.init_schema().await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_station_ids_are_skipped() {
        let store = store().await;

        let inserted = store
            .insert_stations(&[Station::new(1, "Lebak Bulus"), Station::new(1, "Lebak Bulus Grab")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let again = store.insert_stations(&[Station::new(1, "Other")]).await.unwrap();
        assert_eq!(again, 0);

        let stations = store.all_stations().await.unwrap();
        assert_eq!(stations, vec![Station::new(1, "Lebak Bulus")]);
    }

    #[tokio::test]
    async fn schedules_stored_with_seconds() {
        let store = store().await;
        store
            .insert_schedules(&[loaded(1, "Lebak Bulus", "Bundaran HI", "05:00")])
            .await
            .unwrap();

        let (raw,): (String,) = sqlx::query_as("SELECT jadwal FROM schedules")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(raw, "05:00:00");

        let schedules = store.all_schedules().await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].departure.to_string(), "05:00");
    }

    #[tokio::test]
    async fn wipe_removes_everything() {
        let store = store().await;
        store.insert_stations(&[Station::new(1, "Lebak Bulus")]).await.unwrap();
        store
            .insert_schedules(&[
                loaded(1, "Lebak Bulus", "Bundaran HI", "05:00"),
                loaded(1, "Lebak Bulus", "Bundaran HI", "05:10"),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_all_schedules().await.unwrap(), 2);
        assert_eq!(store.delete_all_stations().await.unwrap(), 1);
        assert_eq!(store.count_schedules().await.unwrap(), 0);
        assert_eq!(store.count_stations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn filter_by_station() {
        let store = store().await;
        store
            .insert_schedules(&[
                loaded(1, "Lebak Bulus", "Bundaran HI", "05:00"),
                loaded(2, "Fatmawati", "Bundaran HI", "05:03"),
                loaded(1, "Lebak Bulus", "Lebak Bulus", "05:30"),
            ])
            .await
            .unwrap();

        let rows = store.schedules_by_station(1).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|s| s.station_id == 1));

        assert!(store.schedules_by_station(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_by_direction_and_variant() {
        let store = store().await;
        store
            .insert_schedules(&[
                loaded(1, "Lebak Bulus", "Bundaran HI", "05:00"),
                loaded(1, "", "Bundaran HI", "06:00"),
                loaded(1, "Lebak Bulus", "Lebak Bulus", "05:30"),
                loaded(1, "", "Bundaran HI", "06:10"),
            ])
            .await
            .unwrap();

        let weekday = store
            .schedules_by_station_and_direction(1, "Bundaran HI", DayVariant::Weekday)
            .await
            .unwrap();
        let times: Vec<String> = weekday.iter().map(|s| s.departure.to_string()).collect();
        assert_eq!(times, vec!["05:00"]);

        let weekend = store
            .schedules_by_station_and_direction(1, "Bundaran HI", DayVariant::Weekend)
            .await
            .unwrap();
        let times: Vec<String> = weekend.iter().map(|s| s.departure.to_string()).collect();
        assert_eq!(times, vec!["06:00", "06:10"]);
    }

    #[tokio::test]
    async fn corrupt_time_is_reported() {
        let store = store().await;
        sqlx::query("INSERT INTO schedules (station_id, stasiun_name, arah, jadwal) VALUES (1, 'x', 'y', 'noon')")
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.all_schedules().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { table: "schedules", .. }));
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let store = store().await;
        store.pool().close().await;
        let err = store.ping().await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
