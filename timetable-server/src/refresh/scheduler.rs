//! Daily trigger for the refresh cycle.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use super::{RefreshError, Refresher};

/// The first local midnight in `tz` strictly after `now`.
pub fn next_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    let Some(midnight) = local_date
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
    else {
        return now + Duration::days(1);
    };

    // Zones that skip midnight on a DST change start the day at 01:00
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1))
}

/// Run a refresh at every local midnight in `tz`, forever.
pub async fn run_daily(refresher: Arc<Refresher>, tz: Tz) {
    loop {
        let now = refresher.clock().now();
        let next = next_midnight(now, tz);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next.with_timezone(&tz), "Next timetable refresh scheduled");

        tokio::time::sleep(wait).await;

        match refresher.run_once().await {
            Ok(_) => {}
            Err(RefreshError::AlreadyRunning) => {
                warn!("Skipping scheduled refresh, a cycle is already running");
            }
            Err(e) => error!(error = %e, "Scheduled refresh failed"),
        }
    }
}
