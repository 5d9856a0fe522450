use std::collections::HashSet;

use common::normalize_title;
use rusqlite::{params, OptionalExtension, Row};

use crate::model::{
    AlbumMatchOverride, ExpectedAlbum, ExpectedArtist, ExpectedArtistSettings, ExpectedRelease,
};
use crate::{Db, LibraryError};

/// Canonical discography store: per-artist expected release-groups from the
/// metadata service, plus the user-lifetime rows layered on top of them
/// (ignores, inclusion settings, manual match overrides).
#[derive(Clone)]
pub struct ExpectedStore {
    db: Db,
}

impl ExpectedStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn get_expected_artist(
        &self,
        artist_id: i64,
    ) -> Result<Option<ExpectedArtist>, LibraryError> {
        let conn = self.db.lock();
        let artist = conn
            .query_row(
                "SELECT id, artist_id, mbid, name, updated_at
                 FROM expected_artists WHERE artist_id = ?1",
                params![artist_id],
                map_expected_artist,
            )
            .optional()?;
        Ok(artist)
    }

    pub fn list_expected_artists(&self) -> Result<Vec<ExpectedArtist>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT id, artist_id, mbid, name, updated_at FROM expected_artists ORDER BY name",
        )?;
        let rows = statement.query_map([], map_expected_artist)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn upsert_expected_artist(
        &self,
        artist_id: i64,
        mbid: &str,
        name: &str,
        now: i64,
    ) -> Result<ExpectedArtist, LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO expected_artists (artist_id, mbid, name, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (artist_id) DO UPDATE SET
                 mbid = excluded.mbid,
                 name = excluded.name,
                 updated_at = excluded.updated_at",
            params![artist_id, mbid, name, now],
        )?;
        let artist = conn.query_row(
            "SELECT id, artist_id, mbid, name, updated_at
             FROM expected_artists WHERE artist_id = ?1",
            params![artist_id],
            map_expected_artist,
        )?;
        Ok(artist)
    }

    /// One sync in one transaction: refresh every release the service still
    /// reports, then prune rows this sync did not touch. Release-groups with
    /// an external id upsert on it; the rest insert fresh each time and rely
    /// on the prune to stay current.
    pub fn replace_expected_albums(
        &self,
        expected_artist_id: i64,
        releases: &[ExpectedRelease],
        now: i64,
    ) -> Result<usize, LibraryError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        for release in releases {
            let normalized = normalize_title(&release.title);
            let secondary_json = serde_json::to_string(&release.secondary_types)?;
            match release.mb_release_group_id.as_deref() {
                Some(mb_id) => {
                    tx.execute(
                        "INSERT INTO expected_albums
                             (expected_artist_id, mb_release_group_id, title, normalized_title,
                              primary_type, secondary_types, year, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT (expected_artist_id, mb_release_group_id) DO UPDATE SET
                             title = excluded.title,
                             normalized_title = excluded.normalized_title,
                             primary_type = excluded.primary_type,
                             secondary_types = excluded.secondary_types,
                             year = excluded.year,
                             updated_at = excluded.updated_at",
                        params![
                            expected_artist_id,
                            mb_id,
                            release.title,
                            normalized,
                            release.primary_type,
                            secondary_json,
                            release.year,
                            now
                        ],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO expected_albums
                             (expected_artist_id, mb_release_group_id, title, normalized_title,
                              primary_type, secondary_types, year, updated_at)
                         VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            expected_artist_id,
                            release.title,
                            normalized,
                            release.primary_type,
                            secondary_json,
                            release.year,
                            now
                        ],
                    )?;
                }
            }
        }
        let pruned = tx.execute(
            "DELETE FROM expected_albums WHERE expected_artist_id = ?1 AND updated_at < ?2",
            params![expected_artist_id, now],
        )?;
        tx.commit()?;
        Ok(pruned)
    }

    pub fn list_expected_albums(
        &self,
        expected_artist_id: i64,
    ) -> Result<Vec<ExpectedAlbum>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT id, expected_artist_id, mb_release_group_id, title, normalized_title,
                    primary_type, secondary_types, year, updated_at
             FROM expected_albums WHERE expected_artist_id = ?1
             ORDER BY year, title",
        )?;
        let rows = statement.query_map(params![expected_artist_id], map_expected_album)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_expected_album(&self, id: i64) -> Result<Option<ExpectedAlbum>, LibraryError> {
        let conn = self.db.lock();
        let album = conn
            .query_row(
                "SELECT id, expected_artist_id, mb_release_group_id, title, normalized_title,
                        primary_type, secondary_types, year, updated_at
                 FROM expected_albums WHERE id = ?1",
                params![id],
                map_expected_album,
            )
            .optional()?;
        Ok(album)
    }

    // Ignored set

    pub fn ignore_album(&self, artist_id: i64, expected_album_id: i64) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT OR IGNORE INTO expected_ignored_albums (artist_id, expected_album_id)
             VALUES (?1, ?2)",
            params![artist_id, expected_album_id],
        )?;
        Ok(())
    }

    pub fn unignore_album(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "DELETE FROM expected_ignored_albums WHERE artist_id = ?1 AND expected_album_id = ?2",
            params![artist_id, expected_album_id],
        )?;
        Ok(())
    }

    pub fn list_ignored_ids(&self, artist_id: i64) -> Result<HashSet<i64>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT expected_album_id FROM expected_ignored_albums WHERE artist_id = ?1",
        )?;
        let rows = statement.query_map(params![artist_id], |row| row.get::<_, i64>(0))?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(row?);
        }
        Ok(out)
    }

    // Inclusion settings

    pub fn get_settings(&self, artist_id: i64) -> Result<ExpectedArtistSettings, LibraryError> {
        let conn = self.db.lock();
        let settings = conn
            .query_row(
                "SELECT artist_id, include_live, include_compilations
                 FROM expected_artist_settings WHERE artist_id = ?1",
                params![artist_id],
                |row| {
                    Ok(ExpectedArtistSettings {
                        artist_id: row.get(0)?,
                        include_live: row.get(1)?,
                        include_compilations: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(settings.unwrap_or(ExpectedArtistSettings {
            artist_id,
            include_live: false,
            include_compilations: false,
        }))
    }

    pub fn upsert_settings(
        &self,
        artist_id: i64,
        include_live: bool,
        include_compilations: bool,
    ) -> Result<ExpectedArtistSettings, LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO expected_artist_settings (artist_id, include_live, include_compilations)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (artist_id) DO UPDATE SET
                 include_live = excluded.include_live,
                 include_compilations = excluded.include_compilations",
            params![artist_id, include_live, include_compilations],
        )?;
        Ok(ExpectedArtistSettings {
            artist_id,
            include_live,
            include_compilations,
        })
    }

    // Match overrides

    pub fn list_overrides(&self, artist_id: i64) -> Result<Vec<AlbumMatchOverride>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT o.expected_album_id, o.owned_album_id
             FROM album_match_overrides o
             JOIN expected_albums e ON e.id = o.expected_album_id
             JOIN expected_artists ea ON ea.id = e.expected_artist_id
             WHERE ea.artist_id = ?1",
        )?;
        let rows = statement.query_map(params![artist_id], |row| {
            Ok(AlbumMatchOverride {
                expected_album_id: row.get(0)?,
                owned_album_id: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Overrides are 1:1 in both directions; setting one displaces any prior
    /// link touching either side.
    pub fn set_override(
        &self,
        expected_album_id: i64,
        owned_album_id: i64,
    ) -> Result<(), LibraryError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM album_match_overrides
             WHERE expected_album_id = ?1 OR owned_album_id = ?2",
            params![expected_album_id, owned_album_id],
        )?;
        tx.execute(
            "INSERT INTO album_match_overrides (expected_album_id, owned_album_id)
             VALUES (?1, ?2)",
            params![expected_album_id, owned_album_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear_override(&self, expected_album_id: i64) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "DELETE FROM album_match_overrides WHERE expected_album_id = ?1",
            params![expected_album_id],
        )?;
        Ok(())
    }
}

fn map_expected_artist(row: &Row<'_>) -> rusqlite::Result<ExpectedArtist> {
    Ok(ExpectedArtist {
        id: row.get(0)?,
        artist_id: row.get(1)?,
        mbid: row.get(2)?,
        name: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_expected_album(row: &Row<'_>) -> rusqlite::Result<ExpectedAlbum> {
    let secondary_json: String = row.get(6)?;
    Ok(ExpectedAlbum {
        id: row.get(0)?,
        expected_artist_id: row.get(1)?,
        mb_release_group_id: row.get(2)?,
        title: row.get(3)?,
        normalized_title: row.get(4)?,
        primary_type: row.get(5)?,
        secondary_types: serde_json::from_str(&secondary_json).unwrap_or_default(),
        year: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
