use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use library::{Album, Artist, ArtistDirectoryRow, LibraryStats};

use crate::discography::ArtistOverview;
use crate::error::ServiceError;
use crate::state::{AlbumPage, AlbumsQuery, AppState, OwnedBody};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDetail {
    #[serde(flatten)]
    pub artist: Artist,
    pub albums: Vec<Album>,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<LibraryStats>, ServiceError> {
    Ok(Json(state.library.stats()?))
}

pub async fn list_albums(
    State(state): State<AppState>,
    Query(query): Query<AlbumsQuery>,
) -> Result<Json<AlbumPage>, ServiceError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let owned = match query.owned {
        None => None,
        Some(0) => Some(false),
        Some(1) => Some(true),
        Some(other) => {
            return Err(ServiceError::Validation(format!(
                "owned must be 0 or 1, got {}",
                other
            )))
        }
    };

    let (items, total) =
        state
            .library
            .list_albums(query.search.as_deref(), page, page_size, owned)?;
    Ok(Json(AlbumPage {
        items,
        total,
        page,
        page_size,
    }))
}

pub async fn set_album_owned(
    State(state): State<AppState>,
    Path(album_id): Path<i64>,
    Json(body): Json<OwnedBody>,
) -> Result<Json<Album>, ServiceError> {
    let album = state
        .library
        .set_album_owned(album_id, body.owned)?
        .ok_or_else(|| ServiceError::NotFound(format!("album {} not found", album_id)))?;
    Ok(Json(album))
}

pub async fn list_artists(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArtistDirectoryRow>>, ServiceError> {
    Ok(Json(state.library.list_artists()?))
}

pub async fn get_artist(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<ArtistDetail>, ServiceError> {
    let artist = state
        .library
        .get_artist(artist_id)?
        .filter(|artist| !artist.deleted)
        .ok_or_else(|| ServiceError::NotFound(format!("artist {} not found", artist_id)))?;
    let albums = state.library.list_albums_for_artist(artist.id, false)?;
    Ok(Json(ArtistDetail { artist, albums }))
}

pub async fn get_artist_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArtistDetail>, ServiceError> {
    let artist = state
        .library
        .get_artist_by_slug(&slug)?
        .filter(|artist| !artist.deleted)
        .ok_or_else(|| ServiceError::NotFound(format!("artist '{}' not found", slug)))?;
    let albums = state.library.list_albums_for_artist(artist.id, false)?;
    Ok(Json(ArtistDetail { artist, albums }))
}

pub async fn artist_overview(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<ArtistOverview>, ServiceError> {
    Ok(Json(state.discography.compute_overview(artist_id)?))
}
