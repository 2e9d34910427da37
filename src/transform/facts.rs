//! Songplay facts and catalog id resolution
//!
//! Log events carry no catalog key, only the song title, artist name and track
//! length. Those three attributes are matched exactly against the catalog:
//! strings byte-for-byte, lengths by exact `f64` equality. A miss is normal
//! (most listened tracks are not in the catalog) and leaves both ids null.
//! When several catalog songs share the same triple, the lowest `song_id` wins.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::source::log::PlaybackEvent;

/// Catalog ids for a resolved song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongMatch {
    pub song_id: String,
    pub artist_id: String,
}

/// One playback fact
#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    pub start_time: DateTime<Utc>,
    pub user_id: i64,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongplayRow {
    fn new(event: &PlaybackEvent, song: Option<SongMatch>) -> Self {
        let (song_id, artist_id) = match song {
            Some(m) => (Some(m.song_id), Some(m.artist_id)),
            None => (None, None),
        };

        Self {
            start_time: event.start_time,
            user_id: event.user_id,
            level: event.level.clone(),
            song_id,
            artist_id,
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        }
    }
}

/// Natural-key lookup of catalog songs
pub trait SongResolver {
    /// Find the song matching all three attributes, `None` on a miss
    fn resolve(&self, title: &str, artist: &str, duration: f64) -> Result<Option<SongMatch>>;
}

/// Build one fact per playback event, resolving catalog ids along the way.
pub fn resolve_facts(
    events: &[PlaybackEvent],
    resolver: &dyn SongResolver,
) -> Result<Vec<SongplayRow>> {
    events
        .iter()
        .map(|event| {
            let song = resolver.resolve(&event.song, &event.artist, event.length)?;
            Ok(SongplayRow::new(event, song))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SongKey {
    title: String,
    artist: String,
    duration_bits: u64,
}

impl SongKey {
    fn new(title: &str, artist: &str, duration: f64) -> Self {
        // -0.0 == 0.0 but their bit patterns differ
        let duration = if duration == 0.0 { 0.0 } else { duration };
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            duration_bits: duration.to_bits(),
        }
    }
}

/// In-memory catalog keyed by (title, artist name, duration)
#[derive(Debug, Default)]
pub struct CatalogIndex {
    songs: HashMap<SongKey, SongMatch>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a catalog song. On a key collision the lowest `song_id` is kept,
    /// so the result does not depend on insertion order.
    pub fn insert(&mut self, title: &str, artist: &str, duration: f64, song: SongMatch) {
        self.songs
            .entry(SongKey::new(title, artist, duration))
            .and_modify(|existing| {
                if song.song_id < existing.song_id {
                    *existing = song.clone();
                }
            })
            .or_insert(song);
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

impl SongResolver for CatalogIndex {
    fn resolve(&self, title: &str, artist: &str, duration: f64) -> Result<Option<SongMatch>> {
        Ok(self.songs.get(&SongKey::new(title, artist, duration)).cloned())
    }
}
