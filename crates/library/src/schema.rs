use rusqlite::{params, Connection};
use tracing::info;

use crate::LibraryError;

pub const SCHEMA_VERSION: u32 = 4;

/// Frozen v1 schema. Later versions never rewrite these statements; every
/// shape change after v1 is an `add_column_if_missing` step below so that
/// databases created by any prior release migrate forward in place.
const BASE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL);

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    library_path TEXT NOT NULL DEFAULT '',
    scan_recursive INTEGER NOT NULL DEFAULT 1,
    scan_max_depth INTEGER NOT NULL DEFAULT 3,
    updated_at INTEGER NOT NULL DEFAULT 0);

CREATE TABLE IF NOT EXISTS artists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    deleted INTEGER NOT NULL DEFAULT 0,
    last_seen_at INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT 0);

CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artist_id INTEGER NOT NULL REFERENCES artists(id),
    path TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    formats TEXT NOT NULL DEFAULT '[]',
    track_count INTEGER NOT NULL DEFAULT 0,
    last_file_mtime INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0,
    last_seen_at INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT 0);
CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);

CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    album_id INTEGER NOT NULL REFERENCES albums(id),
    path TEXT NOT NULL UNIQUE,
    ext TEXT NOT NULL DEFAULT '',
    mtime INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    last_seen_at INTEGER NOT NULL DEFAULT 0);
CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);

CREATE TABLE IF NOT EXISTS file_index (
    path TEXT PRIMARY KEY,
    mtime INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    inode_key TEXT,
    tag_album TEXT,
    tag_album_artist TEXT,
    tag_artist TEXT,
    tag_year TEXT,
    tag_title TEXT,
    has_tags INTEGER NOT NULL DEFAULT 0,
    last_scan_at INTEGER NOT NULL DEFAULT 0,
    last_seen_at INTEGER NOT NULL DEFAULT 0);
CREATE INDEX IF NOT EXISTS idx_file_index_scan ON file_index(last_scan_at);

CREATE TABLE IF NOT EXISTS scan_skipped (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_started_at INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    reason TEXT NOT NULL);
CREATE INDEX IF NOT EXISTS idx_scan_skipped_started ON scan_skipped(scan_started_at);

CREATE TABLE IF NOT EXISTS scan_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    status TEXT NOT NULL DEFAULT 'idle',
    started_at INTEGER,
    finished_at INTEGER,
    current_path TEXT,
    scanned_files INTEGER NOT NULL DEFAULT 0,
    skipped_files INTEGER NOT NULL DEFAULT 0,
    artists_seen INTEGER NOT NULL DEFAULT 0,
    albums_seen INTEGER NOT NULL DEFAULT 0,
    tracks_seen INTEGER NOT NULL DEFAULT 0,
    skipped_reasons TEXT NOT NULL DEFAULT '{}',
    error TEXT);

CREATE TABLE IF NOT EXISTS expected_artists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artist_id INTEGER NOT NULL UNIQUE REFERENCES artists(id),
    mbid TEXT UNIQUE,
    name TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT 0);

CREATE TABLE IF NOT EXISTS expected_albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    expected_artist_id INTEGER NOT NULL REFERENCES expected_artists(id) ON DELETE CASCADE,
    mb_release_group_id TEXT,
    title TEXT NOT NULL,
    normalized_title TEXT NOT NULL,
    primary_type TEXT,
    secondary_types TEXT NOT NULL DEFAULT '[]',
    year INTEGER,
    updated_at INTEGER NOT NULL DEFAULT 0,
    UNIQUE (expected_artist_id, mb_release_group_id));
CREATE INDEX IF NOT EXISTS idx_expected_albums_artist ON expected_albums(expected_artist_id);

CREATE TABLE IF NOT EXISTS expected_ignored_albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artist_id INTEGER NOT NULL REFERENCES artists(id),
    expected_album_id INTEGER NOT NULL REFERENCES expected_albums(id) ON DELETE CASCADE,
    UNIQUE (artist_id, expected_album_id));

CREATE TABLE IF NOT EXISTS expected_artist_settings (
    artist_id INTEGER PRIMARY KEY REFERENCES artists(id),
    include_live INTEGER NOT NULL DEFAULT 0);

CREATE TABLE IF NOT EXISTS album_match_overrides (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    expected_album_id INTEGER NOT NULL UNIQUE REFERENCES expected_albums(id) ON DELETE CASCADE,
    owned_album_id INTEGER NOT NULL UNIQUE REFERENCES albums(id));

CREATE TABLE IF NOT EXISTS wishlist_albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    expected_album_id INTEGER NOT NULL UNIQUE REFERENCES expected_albums(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL DEFAULT 0);

CREATE TABLE IF NOT EXISTS wanted_albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artist_id INTEGER NOT NULL REFERENCES artists(id),
    title TEXT NOT NULL,
    normalized_title TEXT NOT NULL,
    year INTEGER,
    source TEXT NOT NULL DEFAULT 'manual',
    created_at INTEGER NOT NULL DEFAULT 0,
    UNIQUE (artist_id, normalized_title));

CREATE TABLE IF NOT EXISTS album_aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wanted_album_id INTEGER NOT NULL REFERENCES wanted_albums(id) ON DELETE CASCADE,
    alias TEXT NOT NULL,
    normalized_alias TEXT NOT NULL,
    UNIQUE (wanted_album_id, normalized_alias));
";

pub fn ensure_schema(conn: &Connection) -> Result<(), LibraryError> {
    conn.execute_batch(BASE_SCHEMA)?;

    // v2: user-settable ownership flag on albums.
    add_column_if_missing(conn, "albums", "owned", "INTEGER NOT NULL DEFAULT 1")?;
    // v3: content hash for filesystems without meaningful inode identity.
    add_column_if_missing(conn, "file_index", "file_hash", "TEXT")?;
    // v4: compilation filter joined the live filter; wishlist grew a status.
    add_column_if_missing(
        conn,
        "expected_artist_settings",
        "include_compilations",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    add_column_if_missing(conn, "wishlist_albums", "status", "TEXT NOT NULL DEFAULT 'wanted'")?;

    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION.to_string()],
    )?;
    conn.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;
    conn.execute("INSERT OR IGNORE INTO scan_state (id) VALUES (1)", [])?;
    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<(), LibraryError> {
    if table_has_column(conn, table, column)? {
        return Ok(());
    }
    info!("migrating: adding column {} to {}", column, table);
    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {};",
        table, column, definition
    ))?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, LibraryError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{ensure_schema, table_has_column, BASE_SCHEMA};

    #[test]
    fn base_schema_is_upgraded_in_place() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(BASE_SCHEMA).unwrap();
        assert!(!table_has_column(&conn, "albums", "owned").unwrap());

        ensure_schema(&conn).unwrap();
        assert!(table_has_column(&conn, "albums", "owned").unwrap());
        assert!(table_has_column(&conn, "file_index", "file_hash").unwrap());
        assert!(table_has_column(&conn, "expected_artist_settings", "include_compilations").unwrap());
        assert!(table_has_column(&conn, "wishlist_albums", "status").unwrap());
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let version: String = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, super::SCHEMA_VERSION.to_string());

        let singleton: i64 = conn
            .query_row("SELECT COUNT(*) FROM scan_state", [], |row| row.get(0))
            .unwrap();
        assert_eq!(singleton, 1);
    }

    #[test]
    fn added_columns_carry_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(BASE_SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO artists (name, slug) VALUES ('Artist', 'artist')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO albums (artist_id, path, title) VALUES (1, '/a', 'A')",
            [],
        )
        .unwrap();

        ensure_schema(&conn).unwrap();
        let owned: i64 = conn
            .query_row("SELECT owned FROM albums WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(owned, 1);
    }
}
