use std::sync::Arc;

use serde::{Deserialize, Serialize};

use library::{
    AlbumWithArtist, ExpectedStore, LibraryStats, LibraryStore, SettingsStore, WishlistStore,
};

use crate::config::Config;
use crate::discography::DiscographyService;
use crate::scan::ScanController;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub library: LibraryStore,
    pub expected: ExpectedStore,
    pub wishlist: WishlistStore,
    pub settings: SettingsStore,
    pub scanner: ScanController,
    pub discography: Arc<DiscographyService>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    pub features: FeatureFlags,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub scanner: bool,
    pub musicbrainz: bool,
    pub wishlist: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStartRequest {
    pub recursive: Option<bool>,
    pub max_depth: Option<i64>,
    pub artist_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStartResponse {
    pub started: bool,
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCancelResponse {
    pub cancelled: bool,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumsQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub owned: Option<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumPage {
    pub items: Vec<AlbumWithArtist>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedBody {
    pub owned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAlbumBody {
    pub expected_album_id: i64,
}

/// Booleans default to false when the body omits them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSettingsBody {
    #[serde(default)]
    pub include_live: bool,
    #[serde(default)]
    pub include_compilations: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBody {
    pub expected_album_id: i64,
    pub owned_album_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOverrideBody {
    pub expected_album_id: i64,
}

/// Either a canonical wishlist add (`expectedAlbumId`) or the legacy manual
/// form (`artistId` + `title`).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub expected_album_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub source: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub stats: LibraryStats,
    pub recent_albums: Vec<AlbumWithArtist>,
    pub missing_total: i64,
    pub wishlist_count: i64,
}
