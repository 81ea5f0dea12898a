//! Schedule records at each stage of the pipeline.
//!
//! - [`ScheduleEntry`]: what the extractor found on the page, times still raw.
//! - [`LoadedSchedule`]: a staged row that passed validation, ready to insert.
//! - [`Schedule`]: a row read back from the store.

use std::collections::HashSet;
use std::fmt;

use chrono::Weekday;

use super::DepartureTime;

/// One departure as scraped from the timetable page.
///
/// `station_id` is `None` when the row's class carried no `row-N` token.
/// `station_name` is blank for the weekend variant of a station's timetable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleEntry {
    pub station_id: Option<u32>,
    pub station_name: String,
    pub direction: String,
    pub departure: String,
}

/// A staged schedule row with a validated departure time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadedSchedule {
    pub station_id: u32,
    pub station_name: String,
    pub direction: String,
    pub departure: DepartureTime,
}

/// A schedule row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: i64,
    pub station_id: i64,
    pub station_name: String,
    pub direction: String,
    pub departure: DepartureTime,
}

/// Which of a station's two timetables applies.
///
/// The page publishes weekday rows with the station name filled in and
/// weekend rows with it left blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayVariant {
    Weekday,
    Weekend,
}

impl DayVariant {
    pub fn for_weekday(day: Weekday) -> Self {
        match day {
            Weekday::Sat | Weekday::Sun => DayVariant::Weekend,
            _ => DayVariant::Weekday,
        }
    }

    /// Whether a row with this station name belongs to the variant.
    pub fn matches(&self, station_name: &str) -> bool {
        let blank = station_name.trim().is_empty();
        match self {
            DayVariant::Weekend => blank,
            DayVariant::Weekday => !blank,
        }
    }
}

impl fmt::Display for DayVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayVariant::Weekday => f.write_str("weekday"),
            DayVariant::Weekend => f.write_str("weekend"),
        }
    }
}

/// Drop rows whose id has already been seen, keeping the first occurrence.
pub fn dedup_first_seen(schedules: Vec<Schedule>) -> Vec<Schedule> {
    let mut seen = HashSet::new();
    schedules
        .into_iter()
        .filter(|s| seen.insert(s.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, time: &str) -> Schedule {
        Schedule {
            id,
            station_id: 4,
            station_name: "Blok M".into(),
            direction: "Lebak Bulus".into(),
            departure: DepartureTime::parse_hhmm(time).unwrap(),
        }
    }

    #[test]
    fn weekend_days() {
        assert_eq!(DayVariant::for_weekday(Weekday::Sat), DayVariant::Weekend);
        assert_eq!(DayVariant::for_weekday(Weekday::Sun), DayVariant::Weekend);
        assert_eq!(DayVariant::for_weekday(Weekday::Mon), DayVariant::Weekday);
        assert_eq!(DayVariant::for_weekday(Weekday::Fri), DayVariant::Weekday);
    }

    #[test]
    fn variant_matches_on_blank_name() {
        assert!(DayVariant::Weekend.matches(""));
        assert!(DayVariant::Weekend.matches("   "));
        assert!(!DayVariant::Weekend.matches("Blok M"));
        assert!(DayVariant::Weekday.matches("Blok M"));
        assert!(!DayVariant::Weekday.matches(""));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let rows = vec![row(1, "05:00"), row(2, "05:10"), row(1, "06:00"), row(3, "05:20")];
        let deduped = dedup_first_seen(rows);

        let ids: Vec<i64> = deduped.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(deduped[0].departure.to_string(), "05:00");
    }

    #[test]
    fn dedup_preserves_order_without_repeats() {
        let rows = vec![row(9, "05:00"), row(3, "05:10"), row(7, "05:20")];
        let ids: Vec<i64> = dedup_first_seen(rows).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![9, 3, 7]);
    }

    #[test]
    fn variant_display() {
        assert_eq!(DayVariant::Weekday.to_string(), "weekday");
        assert_eq!(DayVariant::Weekend.to_string(), "weekend");
    }
}
