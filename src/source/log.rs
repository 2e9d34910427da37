//! Listening log parser
//!
//! Data format: newline-delimited JSON, one event per line, e.g.
//! `{"artist": "Des'ree", "auth": "Logged In", "firstName": "Kaylee", "gender": "F",
//!   "itemInSession": 1, "lastName": "Summers", "length": 246.30812, "level": "free",
//!   "location": "Phoenix-Mesa-Scottsdale, AZ", "method": "PUT", "page": "NextSong",
//!   "sessionId": 139, "song": "You Gotta Be", "ts": 1541106106796,
//!   "userAgent": "Mozilla/5.0 ...", "userId": "8"}`
//!
//! Only `NextSong` lines describe a playback; every other page is navigation noise
//! (Home, Login, Logout, ...) and carries no song fields.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{EtlError, Result};

/// Page value that marks a playback event
pub const PLAYBACK_PAGE: &str = "NextSong";

/// One raw log line. Non-playback lines only carry `page` and `ts`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub page: String,
    /// Epoch milliseconds
    pub ts: i64,
    /// Logged-out events carry an empty string here
    #[serde(default, deserialize_with = "lenient_user_id")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub length: Option<f64>,
}

/// The two fields every line must have
#[derive(Deserialize)]
struct LineHeader {
    page: String,
    ts: i64,
}

/// A playback event with every field the warehouse needs
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    pub start_time: DateTime<Utc>,
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
    pub session_id: i64,
    pub user_agent: Option<String>,
    pub location: Option<String>,
    pub song: String,
    pub artist: String,
    pub length: f64,
}

impl LogEvent {
    pub fn is_playback(&self) -> bool {
        self.page == PLAYBACK_PAGE
    }

    /// `Ok(None)` for non-playback pages; `Err(field)` names the first
    /// required playback field that is missing or out of range.
    pub fn playback(&self) -> std::result::Result<Option<PlaybackEvent>, &'static str> {
        if !self.is_playback() {
            return Ok(None);
        }

        Ok(Some(PlaybackEvent {
            start_time: Utc.timestamp_millis_opt(self.ts).single().ok_or("ts")?,
            user_id: self.user_id.ok_or("userId")?,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            gender: self.gender.clone(),
            level: self.level.clone().ok_or("level")?,
            session_id: self.session_id.ok_or("sessionId")?,
            user_agent: self.user_agent.clone(),
            location: self.location.clone(),
            song: self.song.clone().ok_or("song")?,
            artist: self.artist.clone().ok_or("artist")?,
            length: self.length.ok_or("length")?,
        }))
    }
}

/// Read and parse every line of a log file.
///
/// Any malformed line fails the whole file; blank lines are skipped.
pub fn parse_log_file(path: &Path) -> Result<Vec<LogEvent>> {
    let file = File::open(path)
        .map_err(|e| EtlError::parse(path, None, format!("cannot open file: {}", e)))?;
    parse_log_lines(path, BufReader::new(file))
}

pub fn parse_log_lines<R: BufRead>(path: &Path, reader: R) -> Result<Vec<LogEvent>> {
    let mut events = vec![];

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|e| EtlError::parse(path, Some(line_number), e.to_string()))?;

        if line.trim().is_empty() {
            continue;
        }

        let parse_error =
            |e: serde_json::Error| EtlError::parse(path, Some(line_number), e.to_string());

        let value: Value = serde_json::from_str(&line).map_err(parse_error)?;
        let header = LineHeader::deserialize(&value).map_err(parse_error)?;

        // Fields other than page and ts are only decoded on playback lines
        if header.page != PLAYBACK_PAGE {
            events.push(LogEvent {
                page: header.page,
                ts: header.ts,
                ..LogEvent::default()
            });
            continue;
        }

        let event = LogEvent::deserialize(&value).map_err(parse_error)?;
        if let Err(field) = event.playback() {
            return Err(EtlError::parse(
                path,
                Some(line_number),
                format!("playback event has no valid '{}'", field),
            ));
        }

        events.push(event);
    }

    Ok(events)
}

/// Accepts `"39"`, `39`, `""` and `null`
fn lenient_user_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid userId '{}'", s))),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid userId {}", n))),
        other => Err(D::Error::custom(format!("invalid userId {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXT_SONG: &str = r#"{"artist":"Des'ree","auth":"Logged In","firstName":"Kaylee","gender":"F","itemInSession":1,"lastName":"Summers","length":246.30812,"level":"free","location":"Phoenix-Mesa-Scottsdale, AZ","method":"PUT","page":"NextSong","registration":1540344794796.0,"sessionId":139,"song":"You Gotta Be","status":200,"ts":1541106106796,"userAgent":"Mozilla/5.0","userId":"8"}"#;
    const HOME: &str = r#"{"artist":null,"auth":"Logged In","firstName":"Kaylee","gender":"F","itemInSession":0,"lastName":"Summers","length":null,"level":"free","location":"Phoenix-Mesa-Scottsdale, AZ","method":"GET","page":"Home","registration":1540344794796.0,"sessionId":139,"song":null,"status":200,"ts":1541106106796,"userAgent":"Mozilla/5.0","userId":"8"}"#;
    const LOGGED_OUT: &str = r#"{"artist":null,"auth":"Logged Out","firstName":null,"gender":null,"itemInSession":0,"lastName":null,"length":null,"level":"free","location":null,"method":"PUT","page":"Login","registration":null,"sessionId":52,"song":null,"status":307,"ts":1541207073796,"userAgent":null,"userId":""}"#;

    fn parse(content: &str) -> Result<Vec<LogEvent>> {
        parse_log_lines(Path::new("events.json"), content.as_bytes())
    }

    #[test]
    fn test_parse_mixed_pages() {
        let content = format!("{}\n{}\n{}\n", HOME, NEXT_SONG, LOGGED_OUT);
        let events = parse(&content).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].page, "Home");
        assert!(events[1].is_playback());
        assert_eq!(events[1].user_id, Some(8));
        assert_eq!(events[1].length, Some(246.30812));
        assert_eq!(events[2].user_id, None);
    }

    #[test]
    fn test_playback_fields() {
        let events = parse(NEXT_SONG).unwrap();
        let playback = events[0].playback().unwrap().unwrap();
        assert_eq!(playback.user_id, 8);
        assert_eq!(playback.level, "free");
        assert_eq!(playback.session_id, 139);
        assert_eq!(playback.song, "You Gotta Be");
        assert_eq!(playback.artist, "Des'ree");
        assert_eq!(playback.start_time.timestamp_millis(), 1541106106796);
    }

    #[test]
    fn test_non_playback_has_no_playback() {
        let events = parse(HOME).unwrap();
        assert_eq!(events[0].playback(), Ok(None));
    }

    #[test]
    fn test_non_playback_fields_are_not_validated() {
        let home = HOME
            .replace(r#""sessionId":139"#, r#""sessionId":"139""#)
            .replace(r#""length":null"#, r#""length":"""#);
        let content = format!("{}\n{}\n", home, NEXT_SONG);
        let events = parse(&content).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].page, "Home");
        assert_eq!(events[0].session_id, None);
        assert_eq!(events[1].playback().unwrap().unwrap().session_id, 139);
    }

    #[test]
    fn test_bad_playback_field_type_is_parse_error() {
        let line = NEXT_SONG.replace(r#""sessionId":139"#, r#""sessionId":"139""#);
        let err = parse(&line).unwrap_err();
        assert!(matches!(err, EtlError::Parse { line: Some(1), .. }));
    }

    #[test]
    fn test_numeric_user_id() {
        let line = NEXT_SONG.replace(r#""userId":"8""#, r#""userId":8"#);
        let events = parse(&line).unwrap();
        assert_eq!(events[0].user_id, Some(8));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let content = format!("\n{}\n\n", NEXT_SONG);
        assert_eq!(parse(&content).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_line_fails_whole_file() {
        let content = format!("{}\n{}\n{{broken\n{}\n{}\n", NEXT_SONG, HOME, NEXT_SONG, HOME);
        let err = parse(&content).unwrap_err();
        match err {
            EtlError::Parse { line, .. } => assert_eq!(line, Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_playback_without_song_is_parse_error() {
        let line = NEXT_SONG.replace(r#""song":"You Gotta Be""#, r#""song":null"#);
        let err = parse(&line).unwrap_err();
        assert!(err.to_string().contains("'song'"));
    }

    #[test]
    fn test_missing_ts_is_parse_error() {
        let line = HOME.replace(r#""ts":1541106106796,"#, "");
        assert!(parse(&line).is_err());
    }
}
