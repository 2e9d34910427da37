//! Per-file write batch

use rusqlite::{params, OptionalExtension, Transaction};

use crate::error::{EtlError, Result};
use crate::source::CatalogRecord;
use crate::transform::{start_time_key, SongMatch, SongResolver, SongplayRow, TimeRow, UserRow};

/// Pending writes for one source file.
///
/// Nothing is visible to other connections until [`FileBatch::commit`];
/// dropping the batch rolls everything back.
pub struct FileBatch<'conn> {
    tx: Transaction<'conn>,
    rows: usize,
}

impl<'conn> FileBatch<'conn> {
    pub(super) fn new(tx: Transaction<'conn>) -> Self {
        Self { tx, rows: 0 }
    }

    /// Upsert the artist, then the song. Ids are never rewritten on conflict.
    pub fn upsert_catalog_record(&mut self, record: &CatalogRecord) -> Result<()> {
        self.tx
            .prepare_cached(
                r#"INSERT INTO artists (artist_id, name, location, latitude, longitude)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT(artist_id) DO UPDATE SET
                       name = excluded.name,
                       location = excluded.location,
                       latitude = excluded.latitude,
                       longitude = excluded.longitude"#,
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    record.artist_id,
                    record.artist_name,
                    record.artist_location,
                    record.artist_latitude,
                    record.artist_longitude,
                ])
            })
            .map_err(EtlError::Write)?;

        self.tx
            .prepare_cached(
                r#"INSERT INTO songs (song_id, title, artist_id, year, duration)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT(song_id) DO UPDATE SET
                       title = excluded.title,
                       year = excluded.year,
                       duration = excluded.duration"#,
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    record.song_id,
                    record.title,
                    record.artist_id,
                    record.year,
                    record.duration,
                ])
            })
            .map_err(EtlError::Write)?;

        self.rows += 2;
        Ok(())
    }

    pub fn upsert_time(&mut self, row: &TimeRow) -> Result<()> {
        // Every column is derived from start_time, so an existing row is already correct
        self.tx
            .prepare_cached(
                r#"INSERT INTO time (start_time, hour, day, week, month, year, weekday)
                   VALUES (?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(start_time) DO NOTHING"#,
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    start_time_key(&row.start_time),
                    row.hour,
                    row.day,
                    row.week,
                    row.month,
                    row.year,
                    row.weekday,
                ])
            })
            .map_err(EtlError::Write)?;

        self.rows += 1;
        Ok(())
    }

    /// Latest write wins for the mutable user fields
    pub fn upsert_user(&mut self, row: &UserRow) -> Result<()> {
        self.tx
            .prepare_cached(
                r#"INSERT INTO users (user_id, first_name, last_name, gender, level)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT(user_id) DO UPDATE SET
                       first_name = excluded.first_name,
                       last_name = excluded.last_name,
                       gender = excluded.gender,
                       level = excluded.level"#,
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    row.user_id,
                    row.first_name,
                    row.last_name,
                    row.gender,
                    row.level,
                ])
            })
            .map_err(EtlError::Write)?;

        self.rows += 1;
        Ok(())
    }

    /// Append a fact row. No deduplication.
    pub fn insert_songplay(&mut self, row: &SongplayRow) -> Result<()> {
        self.tx
            .prepare_cached(
                r#"INSERT INTO songplays
                   (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    start_time_key(&row.start_time),
                    row.user_id,
                    row.level,
                    row.song_id,
                    row.artist_id,
                    row.session_id,
                    row.location,
                    row.user_agent,
                ])
            })
            .map_err(EtlError::Write)?;

        self.rows += 1;
        Ok(())
    }

    /// Natural-key lookup against the catalog as it stands inside this transaction
    pub fn lookup_song(
        &self,
        title: &str,
        artist: &str,
        duration: f64,
    ) -> Result<Option<SongMatch>> {
        self.tx
            .prepare_cached(
                r#"SELECT s.song_id, s.artist_id
                   FROM songs s
                   JOIN artists a ON a.artist_id = s.artist_id
                   WHERE s.title = ?1 AND a.name = ?2 AND s.duration = ?3
                   ORDER BY s.song_id
                   LIMIT 1"#,
            )
            .and_then(|mut stmt| {
                stmt.query_row(params![title, artist, duration], |row| {
                    Ok(SongMatch {
                        song_id: row.get(0)?,
                        artist_id: row.get(1)?,
                    })
                })
                .optional()
            })
            .map_err(EtlError::Lookup)
    }

    /// Commit the file's writes, returning the number of rows applied
    pub fn commit(self) -> Result<usize> {
        let rows = self.rows;
        self.tx.commit().map_err(EtlError::Write)?;
        Ok(rows)
    }
}

impl SongResolver for FileBatch<'_> {
    fn resolve(&self, title: &str, artist: &str, duration: f64) -> Result<Option<SongMatch>> {
        self.lookup_song(title, artist, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WarehouseStore;
    use chrono::{TimeZone, Utc};

    fn record(
        song_id: &str,
        title: &str,
        artist_id: &str,
        artist_name: &str,
        duration: f64,
    ) -> CatalogRecord {
        CatalogRecord {
            song_id: song_id.to_string(),
            title: title.to_string(),
            artist_id: artist_id.to_string(),
            artist_name: artist_name.to_string(),
            year: 2004,
            duration,
            artist_location: Some("Detroit, MI".to_string()),
            artist_latitude: None,
            artist_longitude: None,
        }
    }

    fn user(level: &str) -> UserRow {
        UserRow {
            user_id: 80,
            first_name: Some("Tegan".to_string()),
            last_name: Some("Levine".to_string()),
            gender: Some("F".to_string()),
            level: level.to_string(),
        }
    }

    fn songplay(song_id: Option<&str>) -> SongplayRow {
        SongplayRow {
            start_time: Utc.timestamp_millis_opt(1541121934796).unwrap(),
            user_id: 80,
            level: "paid".to_string(),
            song_id: song_id.map(String::from),
            artist_id: song_id.map(|_| "A1".to_string()),
            session_id: 602,
            location: Some("Portland-South Portland, ME".to_string()),
            user_agent: Some("UA".to_string()),
        }
    }

    #[test]
    fn test_catalog_upsert_is_idempotent() {
        let mut store = WarehouseStore::open_in_memory().unwrap();
        let rec = record("S1", "Test", "A1", "Artist", 200.5);

        for _ in 0..2 {
            let mut batch = store.begin().unwrap();
            batch.upsert_catalog_record(&rec).unwrap();
            batch.commit().unwrap();
        }

        let counts = store.table_counts().unwrap();
        assert_eq!(counts.songs, 1);
        assert_eq!(counts.artists, 1);
        let song = store.get_song("S1").unwrap().unwrap();
        assert_eq!(song.title, "Test");
        assert_eq!(song.duration, 200.5);
        let artist = store.get_artist("A1").unwrap().unwrap();
        assert_eq!(artist.location.as_deref(), Some("Detroit, MI"));
    }

    #[test]
    fn test_song_conflict_keeps_artist_id() {
        let mut store = WarehouseStore::open_in_memory().unwrap();

        let mut batch = store.begin().unwrap();
        batch.upsert_catalog_record(&record("S1", "Test", "A1", "Artist", 200.5)).unwrap();
        batch.upsert_catalog_record(&record("S1", "Test (Remaster)", "A2", "Other", 201.0)).unwrap();
        batch.commit().unwrap();

        let song = store.get_song("S1").unwrap().unwrap();
        assert_eq!(song.artist_id, "A1");
        assert_eq!(song.title, "Test (Remaster)");
        assert_eq!(song.duration, 201.0);
    }

    #[test]
    fn test_time_upsert_is_idempotent() {
        let mut store = WarehouseStore::open_in_memory().unwrap();
        let row = TimeRow::from_start_time(Utc.timestamp_millis_opt(1541121934796).unwrap());

        let mut batch = store.begin().unwrap();
        batch.upsert_time(&row).unwrap();
        batch.upsert_time(&row).unwrap();
        batch.commit().unwrap();

        assert_eq!(store.table_counts().unwrap().time, 1);
        let stored = store.get_time("2018-11-02T01:25:34.796Z").unwrap().unwrap();
        assert_eq!(stored.hour, 1);
        assert_eq!(stored.weekday, 4);
        assert_eq!(stored.week, 44);
    }

    #[test]
    fn test_user_level_latest_wins() {
        let mut store = WarehouseStore::open_in_memory().unwrap();

        let mut batch = store.begin().unwrap();
        batch.upsert_user(&user("free")).unwrap();
        batch.upsert_user(&user("free")).unwrap();
        batch.commit().unwrap();
        assert_eq!(store.table_counts().unwrap().users, 1);

        let mut batch = store.begin().unwrap();
        batch.upsert_user(&user("paid")).unwrap();
        batch.commit().unwrap();

        let stored = store.get_user(80).unwrap().unwrap();
        assert_eq!(stored.level, "paid");
        assert_eq!(store.table_counts().unwrap().users, 1);
    }

    #[test]
    fn test_songplays_are_append_only() {
        let mut store = WarehouseStore::open_in_memory().unwrap();

        let mut batch = store.begin().unwrap();
        batch.insert_songplay(&songplay(Some("S1"))).unwrap();
        batch.insert_songplay(&songplay(Some("S1"))).unwrap();
        batch.insert_songplay(&songplay(None)).unwrap();
        assert_eq!(batch.commit().unwrap(), 3);

        let plays = store.list_songplays().unwrap();
        assert_eq!(plays.len(), 3);
        assert_eq!(plays[0].start_time, "2018-11-02T01:25:34.796Z");
        assert_eq!(plays[2].song_id, None);
        assert_eq!(plays[2].artist_id, None);
    }

    #[test]
    fn test_dropped_batch_rolls_back() {
        let mut store = WarehouseStore::open_in_memory().unwrap();

        {
            let mut batch = store.begin().unwrap();
            batch.upsert_user(&user("free")).unwrap();
            batch.insert_songplay(&songplay(None)).unwrap();
        }

        let counts = store.table_counts().unwrap();
        assert_eq!(counts.users, 0);
        assert_eq!(counts.songplays, 0);
    }

    #[test]
    fn test_lookup_song() {
        let mut store = WarehouseStore::open_in_memory().unwrap();

        let mut batch = store.begin().unwrap();
        batch.upsert_catalog_record(&record("S7", "Dup", "A7", "Band", 99.0)).unwrap();
        batch.upsert_catalog_record(&record("S3", "Dup", "A3", "Band", 99.0)).unwrap();
        batch.upsert_catalog_record(&record("S1", "Test", "A1", "Artist", 200.5)).unwrap();

        let hit = batch.lookup_song("Test", "Artist", 200.5).unwrap();
        assert_eq!(
            hit,
            Some(SongMatch {
                song_id: "S1".to_string(),
                artist_id: "A1".to_string()
            })
        );
        assert_eq!(batch.lookup_song("Test", "Artist", 200.0).unwrap(), None);
        assert_eq!(batch.lookup_song("Test", "Someone", 200.5).unwrap(), None);

        let ambiguous = batch.lookup_song("Dup", "Band", 99.0).unwrap().unwrap();
        assert_eq!(ambiguous.song_id, "S3");
    }
}
