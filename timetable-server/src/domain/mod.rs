//! Domain types for the timetable service.
//!
//! Stations and schedules as they move from the scraped page through the
//! staging files into the store, plus the time sources the read side uses.

mod clock;
mod schedule;
mod station;
mod time;

pub use clock::{Clock, ManualClock, SystemClock};
pub use schedule::{DayVariant, LoadedSchedule, Schedule, ScheduleEntry, dedup_first_seen};
pub use station::Station;
pub use time::{DepartureTime, TimeError};
