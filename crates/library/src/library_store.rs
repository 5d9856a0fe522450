use std::collections::BTreeMap;

use common::{short_sha1, slugify};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::model::{
    Album, AlbumWithArtist, Artist, ArtistDirectoryRow, FileIndexEntry, LibraryStats, ScanState,
    SkippedFile, Track,
};
use crate::{Db, LibraryError};

/// Owned-inventory store: artists, albums, tracks, the per-file extraction
/// cache, and the scan bookkeeping tables.
#[derive(Clone)]
pub struct LibraryStore {
    db: Db,
}

impl LibraryStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    // Artists

    pub fn upsert_artist(&self, name: &str, seen_at: i64) -> Result<Artist, LibraryError> {
        let conn = self.db.lock();
        let base = slugify(name);
        let collides: i64 = conn.query_row(
            "SELECT COUNT(*) FROM artists WHERE slug = ?1 AND name <> ?2",
            params![base, name],
            |row| row.get(0),
        )?;
        let slug = if collides > 0 {
            format!("{}-{}", base, short_sha1(name, 6))
        } else {
            base
        };
        conn.execute(
            "INSERT INTO artists (name, slug, deleted, last_seen_at, created_at)
             VALUES (?1, ?2, 0, ?3, ?3)
             ON CONFLICT (name) DO UPDATE SET deleted = 0, last_seen_at = excluded.last_seen_at",
            params![name, slug, seen_at],
        )?;
        let artist = conn.query_row(
            &format!("SELECT {} FROM artists WHERE name = ?1", ARTIST_COLUMNS),
            params![name],
            map_artist,
        )?;
        Ok(artist)
    }

    pub fn get_artist(&self, id: i64) -> Result<Option<Artist>, LibraryError> {
        let conn = self.db.lock();
        let artist = conn
            .query_row(
                &format!("SELECT {} FROM artists WHERE id = ?1", ARTIST_COLUMNS),
                params![id],
                map_artist,
            )
            .optional()?;
        Ok(artist)
    }

    pub fn get_artist_by_slug(&self, slug: &str) -> Result<Option<Artist>, LibraryError> {
        let conn = self.db.lock();
        let artist = conn
            .query_row(
                &format!("SELECT {} FROM artists WHERE slug = ?1", ARTIST_COLUMNS),
                params![slug],
                map_artist,
            )
            .optional()?;
        Ok(artist)
    }

    pub fn get_artist_by_name(&self, name: &str) -> Result<Option<Artist>, LibraryError> {
        let conn = self.db.lock();
        let artist = conn
            .query_row(
                &format!("SELECT {} FROM artists WHERE name = ?1", ARTIST_COLUMNS),
                params![name],
                map_artist,
            )
            .optional()?;
        Ok(artist)
    }

    pub fn list_artists(&self) -> Result<Vec<ArtistDirectoryRow>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT a.id, a.name, a.slug,
                    (SELECT COUNT(*) FROM albums al
                      WHERE al.artist_id = a.id AND al.deleted = 0) AS album_count
             FROM artists a
             WHERE a.deleted = 0
             ORDER BY a.name",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(ArtistDirectoryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                album_count: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    // Albums

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_album(
        &self,
        artist_id: i64,
        path: &str,
        title: &str,
        formats: &[String],
        track_count: i64,
        last_file_mtime: Option<i64>,
        seen_at: i64,
    ) -> Result<Album, LibraryError> {
        let conn = self.db.lock();
        let formats_json = serde_json::to_string(formats)?;
        conn.execute(
            "INSERT INTO albums
                 (artist_id, path, title, formats, track_count, last_file_mtime,
                  owned, deleted, last_seen_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, ?7, ?7)
             ON CONFLICT (path) DO UPDATE SET
                 artist_id = excluded.artist_id,
                 title = excluded.title,
                 formats = excluded.formats,
                 track_count = excluded.track_count,
                 last_file_mtime = excluded.last_file_mtime,
                 deleted = 0,
                 last_seen_at = excluded.last_seen_at",
            params![artist_id, path, title, formats_json, track_count, last_file_mtime, seen_at],
        )?;
        let album = conn.query_row(
            &format!("SELECT {} FROM albums WHERE path = ?1", ALBUM_COLUMNS),
            params![path],
            map_album,
        )?;
        Ok(album)
    }

    pub fn get_album(&self, id: i64) -> Result<Option<Album>, LibraryError> {
        let conn = self.db.lock();
        let album = conn
            .query_row(
                &format!("SELECT {} FROM albums WHERE id = ?1", ALBUM_COLUMNS),
                params![id],
                map_album,
            )
            .optional()?;
        Ok(album)
    }

    pub fn set_album_owned(&self, id: i64, owned: bool) -> Result<Option<Album>, LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE albums SET owned = ?2 WHERE id = ?1",
            params![id, owned],
        )?;
        let album = conn
            .query_row(
                &format!("SELECT {} FROM albums WHERE id = ?1", ALBUM_COLUMNS),
                params![id],
                map_album,
            )
            .optional()?;
        Ok(album)
    }

    pub fn list_albums_for_artist(
        &self,
        artist_id: i64,
        owned_only: bool,
    ) -> Result<Vec<Album>, LibraryError> {
        let conn = self.db.lock();
        let sql = format!(
            "SELECT {} FROM albums WHERE artist_id = ?1 AND deleted = 0 {} ORDER BY title",
            ALBUM_COLUMNS,
            if owned_only { "AND owned = 1" } else { "" }
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(params![artist_id], map_album)?;
        collect_rows(rows)
    }

    pub fn list_albums(
        &self,
        search: Option<&str>,
        page: i64,
        page_size: i64,
        owned: Option<bool>,
    ) -> Result<(Vec<AlbumWithArtist>, i64), LibraryError> {
        let conn = self.db.lock();
        let mut clauses = vec!["a.deleted = 0".to_string()];
        let mut values: Vec<Value> = Vec::new();

        if let Some(owned) = owned {
            values.push(Value::Integer(owned as i64));
            clauses.push(format!("a.owned = ?{}", values.len()));
        }
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            values.push(Value::Text(format!("%{}%", search.to_lowercase())));
            clauses.push(format!(
                "(LOWER(a.title) LIKE ?{n} OR LOWER(ar.name) LIKE ?{n})",
                n = values.len()
            ));
        }
        let where_clause = clauses.join(" AND ");

        let total: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM albums a JOIN artists ar ON ar.id = a.artist_id WHERE {}",
                where_clause
            ),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let offset = (page.max(1) - 1) * page_size;
        values.push(Value::Integer(page_size));
        let limit_index = values.len();
        values.push(Value::Integer(offset));
        let offset_index = values.len();

        let sql = format!(
            "SELECT {}, ar.name, ar.slug
             FROM albums a JOIN artists ar ON ar.id = a.artist_id
             WHERE {}
             ORDER BY ar.name, a.title
             LIMIT ?{} OFFSET ?{}",
            prefixed_album_columns("a"),
            where_clause,
            limit_index,
            offset_index
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(params_from_iter(values.iter()), map_album_with_artist)?;
        Ok((collect_rows(rows)?, total))
    }

    pub fn recent_albums(&self, limit: i64) -> Result<Vec<AlbumWithArtist>, LibraryError> {
        let conn = self.db.lock();
        let sql = format!(
            "SELECT {}, ar.name, ar.slug
             FROM albums a JOIN artists ar ON ar.id = a.artist_id
             WHERE a.deleted = 0
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT ?1",
            prefixed_album_columns("a")
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(params![limit], map_album_with_artist)?;
        collect_rows(rows)
    }

    // Tracks

    pub fn upsert_track(
        &self,
        album_id: i64,
        path: &str,
        ext: &str,
        mtime: i64,
        seen_at: i64,
    ) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO tracks (album_id, path, ext, mtime, deleted, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT (path) DO UPDATE SET
                 album_id = excluded.album_id,
                 ext = excluded.ext,
                 mtime = excluded.mtime,
                 deleted = 0,
                 last_seen_at = excluded.last_seen_at",
            params![album_id, path, ext, mtime, seen_at],
        )?;
        Ok(())
    }

    pub fn list_tracks_for_album(&self, album_id: i64) -> Result<Vec<Track>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT id, album_id, path, ext, mtime, deleted, last_seen_at
             FROM tracks WHERE album_id = ?1 AND deleted = 0 ORDER BY path",
        )?;
        let rows = statement.query_map(params![album_id], |row| {
            Ok(Track {
                id: row.get(0)?,
                album_id: row.get(1)?,
                path: row.get(2)?,
                ext: row.get(3)?,
                mtime: row.get(4)?,
                deleted: row.get(5)?,
                last_seen_at: row.get(6)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn count_live_tracks(&self) -> Result<i64, LibraryError> {
        let conn = self.db.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM tracks WHERE deleted = 0", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn stats(&self) -> Result<LibraryStats, LibraryError> {
        let conn = self.db.lock();
        let artists: i64 =
            conn.query_row("SELECT COUNT(*) FROM artists WHERE deleted = 0", [], |row| {
                row.get(0)
            })?;
        let albums: i64 =
            conn.query_row("SELECT COUNT(*) FROM albums WHERE deleted = 0", [], |row| {
                row.get(0)
            })?;
        let tracks: i64 =
            conn.query_row("SELECT COUNT(*) FROM tracks WHERE deleted = 0", [], |row| {
                row.get(0)
            })?;
        let last_scan_at: Option<i64> = conn.query_row(
            "SELECT finished_at FROM scan_state WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(LibraryStats {
            artists,
            albums,
            tracks,
            last_scan_at,
        })
    }

    // File index

    pub fn get_file_index(&self, path: &str) -> Result<Option<FileIndexEntry>, LibraryError> {
        let conn = self.db.lock();
        let entry = conn
            .query_row(
                "SELECT path, mtime, size, inode_key, file_hash, tag_album, tag_album_artist,
                        tag_artist, tag_year, tag_title, has_tags, last_scan_at, last_seen_at
                 FROM file_index WHERE path = ?1",
                params![path],
                map_file_index,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn upsert_file_index(&self, entry: &FileIndexEntry) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT OR REPLACE INTO file_index
                 (path, mtime, size, inode_key, file_hash, tag_album, tag_album_artist,
                  tag_artist, tag_year, tag_title, has_tags, last_scan_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                entry.path,
                entry.mtime,
                entry.size,
                entry.inode_key,
                entry.file_hash,
                entry.tag_album,
                entry.tag_album_artist,
                entry.tag_artist,
                entry.tag_year,
                entry.tag_title,
                entry.has_tags,
                entry.last_scan_at,
                entry.last_seen_at,
            ],
        )?;
        Ok(())
    }

    pub fn touch_file_index(
        &self,
        path: &str,
        last_scan_at: i64,
        last_seen_at: i64,
    ) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE file_index SET last_scan_at = ?2, last_seen_at = ?3 WHERE path = ?1",
            params![path, last_scan_at, last_seen_at],
        )?;
        Ok(())
    }

    pub fn prune_file_index(&self, scanned_before: i64) -> Result<usize, LibraryError> {
        let conn = self.db.lock();
        let removed = conn.execute(
            "DELETE FROM file_index WHERE last_scan_at < ?1",
            params![scanned_before],
        )?;
        Ok(removed)
    }

    // Scan bookkeeping

    pub fn begin_scan(&self, started_at: i64) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "DELETE FROM scan_skipped WHERE scan_started_at < ?1",
            params![started_at],
        )?;
        conn.execute(
            "UPDATE scan_state SET
                 status = 'running', started_at = ?1, finished_at = NULL,
                 current_path = NULL, scanned_files = 0, skipped_files = 0,
                 artists_seen = 0, albums_seen = 0, tracks_seen = 0,
                 skipped_reasons = '{}', error = NULL
             WHERE id = 1",
            params![started_at],
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_scan_progress(
        &self,
        current_path: Option<&str>,
        scanned_files: i64,
        skipped_files: i64,
        artists_seen: i64,
        albums_seen: i64,
        tracks_seen: i64,
    ) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE scan_state SET
                 current_path = ?1, scanned_files = ?2, skipped_files = ?3,
                 artists_seen = ?4, albums_seen = ?5, tracks_seen = ?6
             WHERE id = 1",
            params![current_path, scanned_files, skipped_files, artists_seen, albums_seen, tracks_seen],
        )?;
        Ok(())
    }

    pub fn finish_scan(
        &self,
        status: &str,
        finished_at: i64,
        skipped_reasons: &BTreeMap<String, i64>,
        error: Option<&str>,
    ) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        let reasons_json = serde_json::to_string(skipped_reasons)?;
        conn.execute(
            "UPDATE scan_state SET
                 status = ?1, finished_at = ?2, current_path = NULL,
                 skipped_reasons = ?3, error = ?4
             WHERE id = 1",
            params![status, finished_at, reasons_json, error],
        )?;
        Ok(())
    }

    pub fn get_scan_state(&self) -> Result<ScanState, LibraryError> {
        let conn = self.db.lock();
        let state = conn.query_row(
            "SELECT status, started_at, finished_at, current_path, scanned_files,
                    skipped_files, artists_seen, albums_seen, tracks_seen,
                    skipped_reasons, error
             FROM scan_state WHERE id = 1",
            [],
            |row| {
                let reasons_json: String = row.get(9)?;
                Ok(ScanState {
                    status: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    current_path: row.get(3)?,
                    scanned_files: row.get(4)?,
                    skipped_files: row.get(5)?,
                    artists_seen: row.get(6)?,
                    albums_seen: row.get(7)?,
                    tracks_seen: row.get(8)?,
                    skipped_reasons_breakdown: serde_json::from_str(&reasons_json)
                        .unwrap_or_default(),
                    error: row.get(10)?,
                })
            },
        )?;
        Ok(state)
    }

    /// A scan left in `running` by a crashed or restarted process can never
    /// complete; surface it as an error instead of wedging the single-flight.
    pub fn mark_interrupted_scan(&self, finished_at: i64) -> Result<bool, LibraryError> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE scan_state SET status = 'error', finished_at = ?1,
                    current_path = NULL, error = 'scan interrupted by restart'
             WHERE id = 1 AND status = 'running'",
            params![finished_at],
        )?;
        Ok(changed > 0)
    }

    pub fn record_skip(
        &self,
        scan_started_at: i64,
        file_path: &str,
        reason: &str,
    ) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO scan_skipped (scan_started_at, file_path, reason) VALUES (?1, ?2, ?3)",
            params![scan_started_at, file_path, reason],
        )?;
        Ok(())
    }

    pub fn list_skips(
        &self,
        scan_started_at: i64,
        limit: i64,
    ) -> Result<Vec<SkippedFile>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT scan_started_at, file_path, reason FROM scan_skipped
             WHERE scan_started_at = ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = statement.query_map(params![scan_started_at, limit], |row| {
            Ok(SkippedFile {
                scan_started_at: row.get(0)?,
                file_path: row.get(1)?,
                reason: row.get(2)?,
            })
        })?;
        collect_rows(rows)
    }

    /// Full-library sweep: anything not seen since the scan started is gone
    /// from disk. Rows are soft-deleted so user state survives a transient
    /// mount outage.
    pub fn soft_delete_missing(&self, started_at: i64) -> Result<(i64, i64, i64), LibraryError> {
        let conn = self.db.lock();
        let tracks = conn.execute(
            "UPDATE tracks SET deleted = 1 WHERE deleted = 0 AND last_seen_at < ?1",
            params![started_at],
        )?;
        let albums = conn.execute(
            "UPDATE albums SET deleted = 1 WHERE deleted = 0 AND last_seen_at < ?1",
            params![started_at],
        )?;
        let artists = conn.execute(
            "UPDATE artists SET deleted = 1 WHERE deleted = 0 AND last_seen_at < ?1",
            params![started_at],
        )?;
        Ok((artists as i64, albums as i64, tracks as i64))
    }
}

const ARTIST_COLUMNS: &str = "id, name, slug, deleted, last_seen_at, created_at";
const ALBUM_COLUMNS: &str =
    "id, artist_id, path, title, formats, track_count, last_file_mtime, owned, deleted, last_seen_at, created_at";

fn prefixed_album_columns(prefix: &str) -> String {
    ALBUM_COLUMNS
        .split(", ")
        .map(|column| format!("{}.{}", prefix, column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_artist(row: &Row<'_>) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        deleted: row.get(3)?,
        last_seen_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_album(row: &Row<'_>) -> rusqlite::Result<Album> {
    let formats_json: String = row.get(4)?;
    Ok(Album {
        id: row.get(0)?,
        artist_id: row.get(1)?,
        path: row.get(2)?,
        title: row.get(3)?,
        formats: serde_json::from_str(&formats_json).unwrap_or_default(),
        track_count: row.get(5)?,
        last_file_mtime: row.get(6)?,
        owned: row.get(7)?,
        deleted: row.get(8)?,
        last_seen_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn map_album_with_artist(row: &Row<'_>) -> rusqlite::Result<AlbumWithArtist> {
    let album = map_album(row)?;
    Ok(AlbumWithArtist {
        album,
        artist_name: row.get(11)?,
        artist_slug: row.get(12)?,
    })
}

fn map_file_index(row: &Row<'_>) -> rusqlite::Result<FileIndexEntry> {
    Ok(FileIndexEntry {
        path: row.get(0)?,
        mtime: row.get(1)?,
        size: row.get(2)?,
        inode_key: row.get(3)?,
        file_hash: row.get(4)?,
        tag_album: row.get(5)?,
        tag_album_artist: row.get(6)?,
        tag_artist: row.get(7)?,
        tag_year: row.get(8)?,
        tag_title: row.get(9)?,
        has_tags: row.get(10)?,
        last_scan_at: row.get(11)?,
        last_seen_at: row.get(12)?,
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, LibraryError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
