//! Time and user dimension rows

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};

use crate::source::log::{LogEvent, PlaybackEvent};

/// Calendar breakdown of one playback start time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRow {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    /// ISO 8601 week number
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u32,
}

impl TimeRow {
    pub fn from_start_time(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_monday(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

impl From<&PlaybackEvent> for UserRow {
    fn from(event: &PlaybackEvent) -> Self {
        Self {
            user_id: event.user_id,
            first_name: event.first_name.clone(),
            last_name: event.last_name.clone(),
            gender: event.gender.clone(),
            level: event.level.clone(),
        }
    }
}

/// Dimension rows derived from one log file, one of each per playback event
#[derive(Debug, Default)]
pub struct Dimensions {
    pub times: Vec<TimeRow>,
    pub users: Vec<UserRow>,
}

/// Keep only playback events, in file order.
///
/// A playback line that lacks a required field is an error rather than
/// being skipped; `Err` names the field.
pub fn playback_events(events: &[LogEvent]) -> Result<Vec<PlaybackEvent>, &'static str> {
    events
        .iter()
        .filter_map(|event| event.playback().transpose())
        .collect()
}

/// Derive time and user rows. Duplicate keys are left for the store's upsert.
pub fn build_dimensions(events: &[PlaybackEvent]) -> Dimensions {
    Dimensions {
        times: events
            .iter()
            .map(|e| TimeRow::from_start_time(e.start_time))
            .collect(),
        users: events.iter().map(UserRow::from).collect(),
    }
}

/// Text form of a start time as stored in the warehouse
pub fn start_time_key(start_time: &DateTime<Utc>) -> String {
    start_time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
