use axum::extract::State;
use axum::Json;

use crate::error::ServiceError;
use crate::state::{AppState, DashboardResponse};

const RECENT_ALBUMS: i64 = 8;

pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ServiceError> {
    let stats = state.library.stats()?;
    let recent_albums = state.library.recent_albums(RECENT_ALBUMS)?;
    let missing_total = state.discography.missing_total()?;
    let wishlist_count = state.discography.wishlist_count()?;
    Ok(Json(DashboardResponse {
        stats,
        recent_albums,
        missing_total,
        wishlist_count,
    }))
}
