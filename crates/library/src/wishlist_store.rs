use common::normalize_title;
use rusqlite::{params, OptionalExtension, Row};

use crate::model::{WantedAlbum, WishlistEntry};
use crate::{Db, LibraryError};

/// Wishlist entries hang off expected release-groups. The older manual path
/// (wanted titles plus aliases) is kept for the artist overview only; the
/// metadata-driven expected tables are canonical everywhere else.
#[derive(Clone)]
pub struct WishlistStore {
    db: Db,
}

impl WishlistStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn add_by_expected(
        &self,
        expected_album_id: i64,
        now: i64,
    ) -> Result<WishlistEntry, LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO wishlist_albums (expected_album_id, status, created_at)
             VALUES (?1, 'wanted', ?2)
             ON CONFLICT (expected_album_id) DO NOTHING",
            params![expected_album_id, now],
        )?;
        let entry = conn.query_row(
            &format!("{} WHERE w.expected_album_id = ?1", WISHLIST_SELECT),
            params![expected_album_id],
            map_wishlist_entry,
        )?;
        Ok(entry)
    }

    pub fn remove_by_expected(&self, expected_album_id: i64) -> Result<bool, LibraryError> {
        let conn = self.db.lock();
        let removed = conn.execute(
            "DELETE FROM wishlist_albums WHERE expected_album_id = ?1",
            params![expected_album_id],
        )?;
        Ok(removed > 0)
    }

    pub fn get_by_expected(
        &self,
        expected_album_id: i64,
    ) -> Result<Option<WishlistEntry>, LibraryError> {
        let conn = self.db.lock();
        let entry = conn
            .query_row(
                &format!("{} WHERE w.expected_album_id = ?1", WISHLIST_SELECT),
                params![expected_album_id],
                map_wishlist_entry,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn list(&self) -> Result<Vec<WishlistEntry>, LibraryError> {
        let conn = self.db.lock();
        let mut statement =
            conn.prepare(&format!("{} ORDER BY w.created_at DESC, w.id DESC", WISHLIST_SELECT))?;
        let rows = statement.query_map([], map_wishlist_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<i64, LibraryError> {
        let conn = self.db.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM wishlist_albums", [], |row| row.get(0))?;
        Ok(count)
    }

    // Legacy wanted-albums path

    pub fn upsert_wanted(
        &self,
        artist_id: i64,
        title: &str,
        year: Option<i64>,
        source: &str,
        now: i64,
    ) -> Result<WantedAlbum, LibraryError> {
        let conn = self.db.lock();
        let normalized = normalize_title(title);
        conn.execute(
            "INSERT INTO wanted_albums (artist_id, title, normalized_title, year, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (artist_id, normalized_title) DO NOTHING",
            params![artist_id, title, normalized, year, source, now],
        )?;
        let wanted = conn.query_row(
            "SELECT id, artist_id, title, year, source, created_at
             FROM wanted_albums WHERE artist_id = ?1 AND normalized_title = ?2",
            params![artist_id, normalized],
            map_wanted,
        )?;
        Ok(wanted)
    }

    pub fn list_wanted(&self, artist_id: i64) -> Result<Vec<WantedAlbum>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT id, artist_id, title, year, source, created_at
             FROM wanted_albums WHERE artist_id = ?1 ORDER BY title",
        )?;
        let rows = statement.query_map(params![artist_id], map_wanted)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_alias(&self, wanted_album_id: i64, alias: &str) -> Result<(), LibraryError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO album_aliases (wanted_album_id, alias, normalized_alias)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (wanted_album_id, normalized_alias) DO NOTHING",
            params![wanted_album_id, alias, normalize_title(alias)],
        )?;
        Ok(())
    }

    /// Normalized alias titles for one wanted album.
    pub fn list_alias_titles(&self, wanted_album_id: i64) -> Result<Vec<String>, LibraryError> {
        let conn = self.db.lock();
        let mut statement = conn.prepare(
            "SELECT normalized_alias FROM album_aliases WHERE wanted_album_id = ?1",
        )?;
        let rows = statement.query_map(params![wanted_album_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

const WISHLIST_SELECT: &str = "SELECT w.id, w.expected_album_id, e.title, e.year, ea.artist_id, w.status, w.created_at
     FROM wishlist_albums w
     JOIN expected_albums e ON e.id = w.expected_album_id
     JOIN expected_artists ea ON ea.id = e.expected_artist_id";

fn map_wishlist_entry(row: &Row<'_>) -> rusqlite::Result<WishlistEntry> {
    Ok(WishlistEntry {
        id: row.get(0)?,
        expected_album_id: row.get(1)?,
        title: row.get(2)?,
        year: row.get(3)?,
        artist_id: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_wanted(row: &Row<'_>) -> rusqlite::Result<WantedAlbum> {
    Ok(WantedAlbum {
        id: row.get(0)?,
        artist_id: row.get(1)?,
        title: row.get(2)?,
        year: row.get(3)?,
        source: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::model::ExpectedRelease;
    use crate::{Db, ExpectedStore, LibraryStore, WishlistStore};

    fn stores() -> (LibraryStore, ExpectedStore, WishlistStore) {
        let db = Db::open_in_memory().unwrap();
        (
            LibraryStore::new(db.clone()),
            ExpectedStore::new(db.clone()),
            WishlistStore::new(db),
        )
    }

    #[test]
    fn wishlist_add_is_idempotent() {
        let (library, expected, wishlist) = stores();
        let artist = library.upsert_artist("X", 1).unwrap();
        let ea = expected.upsert_expected_artist(artist.id, "mbid", "X", 1).unwrap();
        expected
            .replace_expected_albums(
                ea.id,
                &[ExpectedRelease {
                    mb_release_group_id: Some("rg".into()),
                    title: "Catalyst".into(),
                    year: Some(2004),
                    primary_type: Some("Album".into()),
                    secondary_types: Vec::new(),
                }],
                5,
            )
            .unwrap();
        let album_id = expected.list_expected_albums(ea.id).unwrap()[0].id;

        let first = wishlist.add_by_expected(album_id, 100).unwrap();
        let second = wishlist.add_by_expected(album_id, 200).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, 100);
        assert_eq!(second.status, "wanted");
        assert_eq!(second.title, "Catalyst");
        assert_eq!(wishlist.count().unwrap(), 1);

        assert!(wishlist.remove_by_expected(album_id).unwrap());
        assert!(!wishlist.remove_by_expected(album_id).unwrap());
        assert_eq!(wishlist.count().unwrap(), 0);
    }

    #[test]
    fn wanted_albums_dedupe_on_normalized_title() {
        let (library, _, wishlist) = stores();
        let artist = library.upsert_artist("X", 1).unwrap();
        let first = wishlist
            .upsert_wanted(artist.id, "Sticks & Stones", Some(2002), "musicbrainz", 10)
            .unwrap();
        let second = wishlist
            .upsert_wanted(artist.id, "Sticks and Stones (2002)", None, "manual", 20)
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(wishlist.list_wanted(artist.id).unwrap().len(), 1);
    }

    #[test]
    fn aliases_dedupe_and_list_normalized() {
        let (library, _, wishlist) = stores();
        let artist = library.upsert_artist("X", 1).unwrap();
        let wanted = wishlist
            .upsert_wanted(artist.id, "Waiting", Some(1998), "manual", 10)
            .unwrap();
        wishlist.add_alias(wanted.id, "Waiting (1998)").unwrap();
        wishlist.add_alias(wanted.id, "waiting").unwrap();
        let aliases = wishlist.list_alias_titles(wanted.id).unwrap();
        assert_eq!(aliases, vec!["waiting".to_string()]);
    }
}
