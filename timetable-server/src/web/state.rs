//! Application state for the web layer.

use std::sync::Arc;

use crate::domain::Clock;
use crate::refresh::Refresher;
use crate::store::Store;
use crate::timetable::CachedTimetable;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Cache-first timetable queries
    pub timetable: Arc<CachedTimetable>,

    /// Refresh cycle runner, for status reporting
    pub refresher: Arc<Refresher>,

    /// Direct store access for reviews
    pub store: Store,

    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        timetable: Arc<CachedTimetable>,
        refresher: Arc<Refresher>,
        store: Store,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            timetable,
            refresher,
            store,
            clock,
        }
    }
}
