use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use library::WishlistEntry;

use crate::discography::WishlistAddResponse;
use crate::error::ServiceError;
use crate::state::{AppState, WishlistRequest};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub removed: bool,
}

pub async fn list_wishlist(
    State(state): State<AppState>,
) -> Result<Json<Vec<WishlistEntry>>, ServiceError> {
    Ok(Json(state.discography.list_wishlist()?))
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Json(request): Json<WishlistRequest>,
) -> Result<Json<WishlistAddResponse>, ServiceError> {
    Ok(Json(state.discography.add_wishlist(&request)?))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Path(expected_album_id): Path<i64>,
) -> Result<Json<RemoveResponse>, ServiceError> {
    let removed = state.discography.remove_wishlist(expected_album_id)?;
    Ok(Json(RemoveResponse { removed }))
}
