//! Warehouse storage with SQLite
//!
//! All writes for one source file go through a single [`FileBatch`]
//! transaction. Dropping a batch without committing rolls it back.

mod batch;
mod schema;

use anyhow::Context;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::source::SourceKind;
use crate::transform::{CatalogIndex, SongMatch, UserRow};

pub use batch::FileBatch;
pub use schema::{DROP_SCHEMA, SCHEMA};

pub struct WarehouseStore {
    conn: Connection,
}

impl WarehouseStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let connection_error = |e: &dyn std::fmt::Display| EtlError::Connection {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| connection_error(&e))?;
        }

        let conn = Connection::open(path).map_err(|e| connection_error(&e))?;
        conn.busy_timeout(busy_timeout).map_err(|e| connection_error(&e))?;

        let store = Self { conn };
        store.init_schema()?;
        debug!("Opened warehouse at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EtlError::Connection {
            path: ":memory:".into(),
            message: e.to_string(),
        })?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).map_err(EtlError::Write)
    }

    /// Drop and recreate every table
    pub fn reset_schema(&self) -> Result<()> {
        self.conn.execute_batch(DROP_SCHEMA).map_err(EtlError::Write)?;
        self.init_schema()
    }

    /// Start the transaction for one source file
    pub fn begin(&mut self) -> Result<FileBatch<'_>> {
        let tx = self.conn.transaction().map_err(EtlError::Write)?;
        Ok(FileBatch::new(tx))
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    // ============================================
    // CATALOG INDEX
    // ============================================

    /// Load every catalog song into an in-memory natural-key index
    pub fn catalog_index(&self) -> Result<CatalogIndex> {
        let mut stmt = self
            .conn
            .prepare(
                r#"SELECT s.song_id, s.artist_id, s.title, a.name, s.duration
                   FROM songs s
                   JOIN artists a ON a.artist_id = s.artist_id"#,
            )
            .map_err(EtlError::Lookup)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    SongMatch {
                        song_id: row.get(0)?,
                        artist_id: row.get(1)?,
                    },
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(EtlError::Lookup)?;

        let mut index = CatalogIndex::new();
        for row in rows {
            let (song, title, artist, duration) = row.map_err(EtlError::Lookup)?;
            index.insert(&title, &artist, duration, song);
        }

        Ok(index)
    }

    // ============================================
    // LOAD HISTORY
    // ============================================

    /// Record the outcome of one source file, outside any file transaction
    pub fn record_load(
        &self,
        path: &Path,
        kind: SourceKind,
        rows_loaded: usize,
        error: Option<&str>,
    ) -> Result<()> {
        let status = if error.is_some() { "failed" } else { "loaded" };
        self.conn
            .execute(
                "INSERT INTO load_history (path, kind, status, rows_loaded, error, processed_at)
                 VALUES (?, ?, ?, ?, ?, datetime('now'))",
                params![
                    path.to_string_lossy().to_string(),
                    kind.as_str(),
                    status,
                    rows_loaded as i64,
                    error,
                ],
            )
            .map_err(EtlError::Write)?;
        Ok(())
    }

    pub fn recent_loads(&self, limit: usize) -> anyhow::Result<Vec<LoadHistoryRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT path, kind, status, rows_loaded, error, processed_at
               FROM load_history
               ORDER BY id DESC
               LIMIT ?"#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(LoadHistoryRow {
                path: row.get(0)?,
                kind: row.get(1)?,
                status: row.get(2)?,
                rows_loaded: row.get(3)?,
                error: row.get(4)?,
                processed_at: row.get(5)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // ============================================
    // QUERIES
    // ============================================

    pub fn table_counts(&self) -> anyhow::Result<TableCounts> {
        let count = |table: &str| -> anyhow::Result<i64> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .with_context(|| format!("Failed to count {}", table))
        };

        let resolved_songplays: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM songplays WHERE song_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(TableCounts {
            songs: count("songs")?,
            artists: count("artists")?,
            users: count("users")?,
            time: count("time")?,
            songplays: count("songplays")?,
            resolved_songplays,
        })
    }

    pub fn get_song(&self, song_id: &str) -> anyhow::Result<Option<SongRow>> {
        let result = self.conn.query_row(
            "SELECT song_id, title, artist_id, year, duration FROM songs WHERE song_id = ?",
            params![song_id],
            |row| {
                Ok(SongRow {
                    song_id: row.get(0)?,
                    title: row.get(1)?,
                    artist_id: row.get(2)?,
                    year: row.get(3)?,
                    duration: row.get(4)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_artist(&self, artist_id: &str) -> anyhow::Result<Option<ArtistRow>> {
        let result = self.conn.query_row(
            "SELECT artist_id, name, location, latitude, longitude FROM artists WHERE artist_id = ?",
            params![artist_id],
            |row| {
                Ok(ArtistRow {
                    artist_id: row.get(0)?,
                    name: row.get(1)?,
                    location: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user(&self, user_id: i64) -> anyhow::Result<Option<UserRow>> {
        let result = self.conn.query_row(
            "SELECT user_id, first_name, last_name, gender, level FROM users WHERE user_id = ?",
            params![user_id],
            |row| {
                Ok(UserRow {
                    user_id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    gender: row.get(3)?,
                    level: row.get(4)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_time(&self, start_time: &str) -> anyhow::Result<Option<TimeRecord>> {
        let result = self.conn.query_row(
            r#"SELECT start_time, hour, day, week, month, year, weekday
               FROM time WHERE start_time = ?"#,
            params![start_time],
            |row| {
                Ok(TimeRecord {
                    start_time: row.get(0)?,
                    hour: row.get(1)?,
                    day: row.get(2)?,
                    week: row.get(3)?,
                    month: row.get(4)?,
                    year: row.get(5)?,
                    weekday: row.get(6)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_songplays(&self) -> anyhow::Result<Vec<SongplayRecord>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT songplay_id, start_time, user_id, level, song_id, artist_id,
                      session_id, location, user_agent
               FROM songplays
               ORDER BY songplay_id"#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SongplayRecord {
                songplay_id: row.get(0)?,
                start_time: row.get(1)?,
                user_id: row.get(2)?,
                level: row.get(3)?,
                song_id: row.get(4)?,
                artist_id: row.get(5)?,
                session_id: row.get(6)?,
                location: row.get(7)?,
                user_agent: row.get(8)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRecord {
    pub start_time: String,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongplayRecord {
    pub songplay_id: i64,
    pub start_time: String,
    pub user_id: i64,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCounts {
    pub songs: i64,
    pub artists: i64,
    pub users: i64,
    pub time: i64,
    pub songplays: i64,
    pub resolved_songplays: i64,
}

#[derive(Debug)]
pub struct LoadHistoryRow {
    pub path: String,
    pub kind: String,
    pub status: String,
    pub rows_loaded: i64,
    pub error: Option<String>,
    pub processed_at: String,
}
