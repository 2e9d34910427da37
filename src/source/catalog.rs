//! Catalog snapshot parser
//!
//! Data format: one JSON object per file, e.g.
//! `{"song_id": "SOABC12", "title": "...", "artist_id": "AR123", "artist_name": "...",
//!   "year": 0, "duration": 218.93, "artist_location": "", "artist_latitude": null,
//!   "artist_longitude": null, "num_songs": 1}`

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

use crate::error::{EtlError, Result};

/// One song and the artist that recorded it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    /// 0 when unknown
    #[serde(default, deserialize_with = "year_or_unknown")]
    pub year: i32,
    pub duration: f64,
    #[serde(default)]
    pub artist_location: Option<String>,
    #[serde(default)]
    pub artist_latitude: Option<f64>,
    #[serde(default)]
    pub artist_longitude: Option<f64>,
}

impl CatalogRecord {
    /// Read and parse a catalog file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EtlError::parse(path, None, format!("cannot read file: {}", e)))?;
        Self::parse(path, &content)
    }

    /// Parse a catalog document. `path` is only used for error reporting.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let record: CatalogRecord = serde_json::from_str(content.trim())
            .map_err(|e| EtlError::parse(path, None, e.to_string()))?;

        if record.song_id.is_empty() {
            return Err(EtlError::parse(path, None, "empty song_id"));
        }
        if record.artist_id.is_empty() {
            return Err(EtlError::parse(path, None, "empty artist_id"));
        }

        Ok(record)
    }
}

/// `null` and a missing key both mean unknown
fn year_or_unknown<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i32>::deserialize(deserializer)?.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"num_songs": 1, "artist_id": "ARD7TVE1187B99BFB1", "artist_latitude": null, "artist_longitude": null, "artist_location": "California - LA", "artist_name": "Casual", "song_id": "SOMZWCG12A8C13C480", "title": "I Didn't Mean To", "duration": 218.93179, "year": 0}"#;

    #[test]
    fn test_parse_catalog_record() {
        let record = CatalogRecord::parse(Path::new("song.json"), SAMPLE).unwrap();
        assert_eq!(record.song_id, "SOMZWCG12A8C13C480");
        assert_eq!(record.artist_id, "ARD7TVE1187B99BFB1");
        assert_eq!(record.title, "I Didn't Mean To");
        assert_eq!(record.artist_name, "Casual");
        assert_eq!(record.year, 0);
        assert_eq!(record.duration, 218.93179);
        assert_eq!(record.artist_location.as_deref(), Some("California - LA"));
        assert_eq!(record.artist_latitude, None);
    }

    #[test]
    fn test_coordinates_are_kept() {
        let json = r#"{"song_id": "S1", "title": "T", "artist_id": "A1", "artist_name": "N",
            "year": 1999, "duration": 120.0, "artist_latitude": 35.14968, "artist_longitude": -90.04892}"#;
        let record = CatalogRecord::parse(Path::new("song.json"), json).unwrap();
        assert_eq!(record.year, 1999);
        assert_eq!(record.artist_latitude, Some(35.14968));
        assert_eq!(record.artist_longitude, Some(-90.04892));
        assert_eq!(record.artist_location, None);
    }

    #[test]
    fn test_unknown_year_is_zero() {
        let null_year = r#"{"song_id": "S1", "title": "T", "artist_id": "A1", "artist_name": "N",
            "year": null, "duration": 120.0}"#;
        let record = CatalogRecord::parse(Path::new("song.json"), null_year).unwrap();
        assert_eq!(record.year, 0);

        let no_year = r#"{"song_id": "S1", "title": "T", "artist_id": "A1", "artist_name": "N",
            "duration": 120.0}"#;
        let record = CatalogRecord::parse(Path::new("song.json"), no_year).unwrap();
        assert_eq!(record.year, 0);
    }

    #[test]
    fn test_missing_song_id_is_parse_error() {
        let json = r#"{"title": "T", "artist_id": "A1", "artist_name": "N", "duration": 1.0}"#;
        let err = CatalogRecord::parse(Path::new("song.json"), json).unwrap_err();
        assert!(matches!(err, EtlError::Parse { .. }));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = CatalogRecord::parse(Path::new("song.json"), "{not json").unwrap_err();
        assert!(matches!(err, EtlError::Parse { line: None, .. }));
    }
}
