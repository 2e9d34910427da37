//! SQLite schema definition - star schema for listening history
//!
//! Fact table: songplays
//! Dimensions: users, songs, artists, time
//! Bookkeeping: load_history (one row per attempted source file)

pub const SCHEMA: &str = r#"
-- ============================================
-- DIMENSIONS
-- ============================================

CREATE TABLE IF NOT EXISTS artists (
    artist_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    location TEXT,
    latitude REAL,
    longitude REAL
);

CREATE TABLE IF NOT EXISTS songs (
    song_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    artist_id TEXT NOT NULL,               -- soft reference to artists
    year INTEGER NOT NULL DEFAULT 0,       -- 0 = unknown
    duration REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    first_name TEXT,
    last_name TEXT,
    gender TEXT,
    level TEXT NOT NULL                    -- 'free' | 'paid', latest load wins
);

CREATE TABLE IF NOT EXISTS time (
    start_time TEXT PRIMARY KEY,           -- RFC 3339, millisecond precision, UTC
    hour INTEGER NOT NULL,
    day INTEGER NOT NULL,
    week INTEGER NOT NULL,                 -- ISO week
    month INTEGER NOT NULL,
    year INTEGER NOT NULL,
    weekday INTEGER NOT NULL               -- 0 = Monday
);

-- ============================================
-- FACTS
-- ============================================

-- Append-only: reloading a log file appends its plays again
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    level TEXT NOT NULL,
    song_id TEXT,                          -- NULL when not in the catalog
    artist_id TEXT,
    session_id INTEGER NOT NULL,
    location TEXT,
    user_agent TEXT
);

-- ============================================
-- BOOKKEEPING
-- ============================================

CREATE TABLE IF NOT EXISTS load_history (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    kind TEXT NOT NULL,                    -- 'catalog' | 'log'
    status TEXT NOT NULL,                  -- 'loaded' | 'failed'
    rows_loaded INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    processed_at DATETIME NOT NULL
);

-- ============================================
-- INDEXES
-- ============================================

-- Natural-key lookup of songs from log events
CREATE INDEX IF NOT EXISTS idx_songs_title_duration ON songs(title, duration);
CREATE INDEX IF NOT EXISTS idx_artists_name ON artists(name);

CREATE INDEX IF NOT EXISTS idx_songplays_start_time ON songplays(start_time);
CREATE INDEX IF NOT EXISTS idx_songplays_user ON songplays(user_id);
CREATE INDEX IF NOT EXISTS idx_songplays_song ON songplays(song_id);

CREATE INDEX IF NOT EXISTS idx_load_history_processed ON load_history(processed_at DESC);
"#;

/// Drops every warehouse table; `SCHEMA` recreates them
pub const DROP_SCHEMA: &str = r#"
DROP TABLE IF EXISTS songplays;
DROP TABLE IF EXISTS users;
DROP TABLE IF EXISTS songs;
DROP TABLE IF EXISTS artists;
DROP TABLE IF EXISTS time;
DROP TABLE IF EXISTS load_history;
"#;
