pub mod dashboard;
pub mod expected;
pub mod library;
pub mod scan;
pub mod settings;
pub mod wishlist;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::state::{AppState, FeatureFlags, HealthResponse};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/settings", get(settings::get_settings).put(settings::update_settings))
        .route("/api/stats", get(library::get_stats))
        .route("/api/scan/start", post(scan::start_scan))
        .route("/api/scan/cancel", post(scan::cancel_scan))
        .route("/api/scan/status", get(scan::scan_status))
        .route("/api/scan/skipped", get(scan::scan_skipped))
        .route("/api/library/albums", get(library::list_albums))
        .route("/api/library/albums/:album_id/owned", put(library::set_album_owned))
        .route("/api/library/artists", get(library::list_artists))
        .route("/api/library/artists/:artist_id", get(library::get_artist))
        .route("/api/artist/by-slug/:slug", get(library::get_artist_by_slug))
        .route("/api/artist/:artist_id/overview", get(library::artist_overview))
        .route("/api/expected/artist/:artist_id/sync", post(expected::sync_artist))
        .route("/api/expected/artist/:artist_id/summary", get(expected::artist_summary))
        .route("/api/expected/artist/:artist_id/ignore", post(expected::ignore_album))
        .route("/api/expected/artist/:artist_id/unignore", post(expected::unignore_album))
        .route(
            "/api/expected/artist/:artist_id/settings",
            get(expected::get_artist_settings).post(expected::update_artist_settings),
        )
        .route(
            "/api/expected/artist/:artist_id/override",
            post(expected::set_override).delete(expected::clear_override),
        )
        .route("/api/wishlist", get(wishlist::list_wishlist).post(wishlist::add_to_wishlist))
        .route(
            "/api/wishlist/:expected_album_id",
            axum::routing::delete(wishlist::remove_from_wishlist),
        )
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.config.version.clone(),
        git_sha: state.config.git_sha.clone(),
        features: FeatureFlags {
            scanner: true,
            musicbrainz: true,
            wishlist: true,
        },
    })
}
