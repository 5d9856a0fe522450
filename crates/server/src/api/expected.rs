use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use library::ExpectedArtistSettings;

use crate::discography::ArtistSummary;
use crate::error::ServiceError;
use crate::state::{AppState, ArtistSettingsBody, ClearOverrideBody, ExpectedAlbumBody, OverrideBody};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn sync_artist(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<ArtistSummary>, ServiceError> {
    let summary = state.discography.sync_expected_for_artist(artist_id).await?;
    Ok(Json(summary))
}

pub async fn artist_summary(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<ArtistSummary>, ServiceError> {
    Ok(Json(state.discography.compute_summary(artist_id)?))
}

pub async fn ignore_album(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
    Json(body): Json<ExpectedAlbumBody>,
) -> Result<Json<OkResponse>, ServiceError> {
    state
        .discography
        .ignore_expected_album(artist_id, body.expected_album_id)?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn unignore_album(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
    Json(body): Json<ExpectedAlbumBody>,
) -> Result<Json<OkResponse>, ServiceError> {
    state
        .discography
        .unignore_expected_album(artist_id, body.expected_album_id)?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn get_artist_settings(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<ExpectedArtistSettings>, ServiceError> {
    Ok(Json(state.discography.get_artist_settings(artist_id)?))
}

pub async fn update_artist_settings(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
    body: Option<Json<ArtistSettingsBody>>,
) -> Result<Json<ExpectedArtistSettings>, ServiceError> {
    let Json(body) = body.unwrap_or_default();
    let settings = state.discography.update_artist_settings(
        artist_id,
        body.include_live,
        body.include_compilations,
    )?;
    Ok(Json(settings))
}

pub async fn set_override(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
    Json(body): Json<OverrideBody>,
) -> Result<Json<ArtistSummary>, ServiceError> {
    state
        .discography
        .set_match_override(artist_id, body.expected_album_id, body.owned_album_id)?;
    Ok(Json(state.discography.compute_summary(artist_id)?))
}

pub async fn clear_override(
    State(state): State<AppState>,
    Path(artist_id): Path<i64>,
    Json(body): Json<ClearOverrideBody>,
) -> Result<Json<ArtistSummary>, ServiceError> {
    state
        .discography
        .clear_match_override(artist_id, body.expected_album_id)?;
    Ok(Json(state.discography.compute_summary(artist_id)?))
}
