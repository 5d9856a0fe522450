use axum::extract::State;
use axum::Json;

use common::now_millis;
use library::{LibrarySettings, SettingsPatch};

use crate::error::ServiceError;
use crate::state::AppState;

const MIN_DEPTH: i64 = 1;
const MAX_DEPTH: i64 = 20;

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<LibrarySettings>, ServiceError> {
    Ok(Json(state.settings.get()?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<LibrarySettings>, ServiceError> {
    if let Some(depth) = patch.scan_max_depth {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(ServiceError::Validation(format!(
                "scanMaxDepth must be between {} and {}",
                MIN_DEPTH, MAX_DEPTH
            )));
        }
    }
    if let Some(path) = patch.library_path.as_deref() {
        if path.trim().is_empty() {
            return Err(ServiceError::Validation(
                "libraryPath must not be empty".to_string(),
            ));
        }
    }
    Ok(Json(state.settings.apply_patch(&patch, now_millis())?))
}
