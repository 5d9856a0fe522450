use std::collections::BTreeMap;

use metadata::TagInfo;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub deleted: bool,
    pub last_seen_at: i64,
    pub created_at: i64,
}

/// Directory listing row: artist plus the size of its owned shelf.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDirectoryRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub album_count: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: i64,
    pub artist_id: i64,
    pub path: String,
    pub title: String,
    pub formats: Vec<String>,
    pub track_count: i64,
    pub last_file_mtime: Option<i64>,
    pub owned: bool,
    pub deleted: bool,
    pub last_seen_at: i64,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumWithArtist {
    #[serde(flatten)]
    pub album: Album,
    pub artist_name: String,
    pub artist_slug: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i64,
    pub album_id: i64,
    pub path: String,
    pub ext: String,
    pub mtime: i64,
    pub deleted: bool,
    pub last_seen_at: i64,
}

/// Cached per-file extraction result keyed by canonical path. A row whose
/// `(mtime, size)` still match lets the scanner skip tag parsing entirely.
#[derive(Clone, Debug, Default)]
pub struct FileIndexEntry {
    pub path: String,
    pub mtime: i64,
    pub size: i64,
    pub inode_key: Option<String>,
    pub file_hash: Option<String>,
    pub tag_album: Option<String>,
    pub tag_album_artist: Option<String>,
    pub tag_artist: Option<String>,
    pub tag_year: Option<String>,
    pub tag_title: Option<String>,
    pub has_tags: bool,
    pub last_scan_at: i64,
    pub last_seen_at: i64,
}

impl FileIndexEntry {
    pub fn tags(&self) -> Option<TagInfo> {
        if !self.has_tags {
            return None;
        }
        Some(TagInfo {
            album: self.tag_album.clone(),
            album_artist: self.tag_album_artist.clone(),
            artist: self.tag_artist.clone(),
            year: self.tag_year.clone(),
            title: self.tag_title.clone(),
        })
    }

    pub fn set_tags(&mut self, tags: Option<&TagInfo>) {
        match tags {
            Some(tags) => {
                self.has_tags = true;
                self.tag_album = tags.album.clone();
                self.tag_album_artist = tags.album_artist.clone();
                self.tag_artist = tags.artist.clone();
                self.tag_year = tags.year.clone();
                self.tag_title = tags.title.clone();
            }
            None => {
                self.has_tags = false;
                self.tag_album = None;
                self.tag_album_artist = None;
                self.tag_artist = None;
                self.tag_year = None;
                self.tag_title = None;
            }
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub scan_started_at: i64,
    pub file_path: String,
    pub reason: String,
}

/// Snapshot of the scan singleton row; doubles as the status DTO.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub status: String,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub current_path: Option<String>,
    pub scanned_files: i64,
    pub skipped_files: i64,
    pub artists_seen: i64,
    pub albums_seen: i64,
    pub tracks_seen: i64,
    pub skipped_reasons_breakdown: BTreeMap<String, i64>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub artists: i64,
    pub albums: i64,
    pub tracks: i64,
    pub last_scan_at: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtist {
    pub id: i64,
    pub artist_id: i64,
    pub mbid: Option<String>,
    pub name: String,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAlbum {
    pub id: i64,
    pub expected_artist_id: i64,
    pub mb_release_group_id: Option<String>,
    pub title: String,
    pub normalized_title: String,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
    pub year: Option<i64>,
    pub updated_at: i64,
}

/// One release-group as handed over by the metadata client; the store owns
/// title normalization so the stored invariant cannot drift.
#[derive(Clone, Debug)]
pub struct ExpectedRelease {
    pub mb_release_group_id: Option<String>,
    pub title: String,
    pub year: Option<i64>,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtistSettings {
    pub artist_id: i64,
    pub include_live: bool,
    pub include_compilations: bool,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMatchOverride {
    pub expected_album_id: i64,
    pub owned_album_id: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: i64,
    pub expected_album_id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub artist_id: i64,
    pub status: String,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedAlbum {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub source: String,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySettings {
    pub library_path: String,
    pub scan_recursive: bool,
    pub scan_max_depth: i64,
    pub updated_at: i64,
}

/// Partial settings update. Unknown fields are dropped during
/// deserialization; absent fields keep their current values.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub library_path: Option<String>,
    pub scan_recursive: Option<bool>,
    pub scan_max_depth: Option<i64>,
}
