//! Cache-first read API over the store.

use std::sync::Arc;

use chrono::Datelike;
use chrono_tz::Tz;
use tracing::debug;

use crate::cache::{CacheKey, CachedValue, QueryCache};
use crate::domain::{Clock, DayVariant, Schedule, Station, dedup_first_seen};
use crate::store::{Store, StoreError};

/// Where a response's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Origin,
}

impl DataSource {
    /// Value of the `X-Data-Source` response header.
    pub fn header_value(&self) -> &'static str {
        match self {
            DataSource::Cache => "Cache",
            DataSource::Origin => "API",
        }
    }
}

/// Query result tagged with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Sourced<T> {
    fn cache(data: T) -> Self {
        Self {
            data,
            source: DataSource::Cache,
        }
    }

    fn origin(data: T) -> Self {
        Self {
            data,
            source: DataSource::Origin,
        }
    }
}

/// Timetable queries, answered from the cache when possible.
///
/// On a miss the store is queried and the result cached before returning.
pub struct CachedTimetable {
    store: Store,
    cache: QueryCache,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl CachedTimetable {
    pub fn new(store: Store, cache: QueryCache, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            store,
            cache,
            clock,
            tz,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Today's timetable variant in the configured timezone.
    pub fn current_variant(&self) -> DayVariant {
        let local = self.clock.now().with_timezone(&self.tz);
        DayVariant::for_weekday(local.weekday())
    }

    pub async fn get_all_stations(&self) -> Result<Sourced<Arc<Vec<Station>>>, StoreError> {
        let key = CacheKey::AllStations;
        if let Some(stations) = self.cache.get_stations(&key).await {
            return Ok(Sourced::cache(stations));
        }

        let stations = Arc::new(self.store.all_stations().await?);
        self.cache
            .set(key, CachedValue::Stations(stations.clone()))
            .await;
        Ok(Sourced::origin(stations))
    }

    pub async fn get_all_schedules(&self) -> Result<Sourced<Arc<Vec<Schedule>>>, StoreError> {
        self.schedules_through_cache(CacheKey::AllSchedules, || self.store.all_schedules())
            .await
    }

    pub async fn get_schedules_by_station(
        &self,
        station_id: u32,
    ) -> Result<Sourced<Arc<Vec<Schedule>>>, StoreError> {
        self.schedules_through_cache(CacheKey::StationSchedules(station_id), || {
            self.store.schedules_by_station(station_id)
        })
        .await
    }

    /// Departures from one station in one direction for today's variant.
    ///
    /// Saturday and Sunday in the configured timezone select the weekend
    /// rows; any other day the weekday rows.
    pub async fn get_schedules_by_station_and_direction(
        &self,
        station_id: u32,
        direction: &str,
    ) -> Result<Sourced<Arc<Vec<Schedule>>>, StoreError> {
        let variant = self.current_variant();
        let key = CacheKey::StationDirection {
            station_id,
            direction: direction.to_string(),
            variant,
        };

        self.schedules_through_cache(key, || async move {
            let rows = self
                .store
                .schedules_by_station_and_direction(station_id, direction, variant)
                .await?;
            Ok(dedup_first_seen(rows))
        })
        .await
    }

    async fn schedules_through_cache<F, Fut>(
        &self,
        key: CacheKey,
        query: F,
    ) -> Result<Sourced<Arc<Vec<Schedule>>>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Schedule>, StoreError>>,
    {
        if let Some(schedules) = self.cache.get_schedules(&key).await {
            debug!(key = %key, "Serving schedules from cache");
            return Ok(Sourced::cache(schedules));
        }

        let schedules = Arc::new(query().await?);
        self.cache
            .set(key, CachedValue::Schedules(schedules.clone()))
            .await;
        Ok(Sourced::origin(schedules))
    }
}
