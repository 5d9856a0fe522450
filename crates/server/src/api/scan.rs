use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::Json;

use library::{ScanState, SkippedFile};

use crate::error::ServiceError;
use crate::scan::{spawn_scan, ScanDeps, ScanOptions};
use crate::state::{
    AppState, ScanCancelResponse, ScanStartRequest, ScanStartResponse, SkippedQuery,
};

const MIN_DEPTH: i64 = 1;
const MAX_DEPTH: i64 = 20;
const MAX_SKIPPED_LIMIT: i64 = 1000;
const DEFAULT_SKIPPED_LIMIT: i64 = 100;

pub async fn start_scan(
    State(state): State<AppState>,
    body: Option<Json<ScanStartRequest>>,
) -> Result<Json<ScanStartResponse>, ServiceError> {
    let Json(request) = body.unwrap_or_default();

    let settings = state.settings.get()?;
    let max_depth = request.max_depth.unwrap_or(settings.scan_max_depth);
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&max_depth) {
        return Err(ServiceError::Validation(format!(
            "maxDepth must be between {} and {}",
            MIN_DEPTH, MAX_DEPTH
        )));
    }
    let recursive = request.recursive.unwrap_or(settings.scan_recursive);

    let root = if settings.library_path.trim().is_empty() {
        state.config.music_dir.clone()
    } else {
        PathBuf::from(settings.library_path.trim())
    };
    if !root.is_dir() {
        return Err(ServiceError::Validation(format!(
            "library path {} is not a readable directory",
            root.display()
        )));
    }

    if let Some(artist_id) = request.artist_id {
        state
            .library
            .get_artist(artist_id)?
            .filter(|artist| !artist.deleted)
            .ok_or_else(|| ServiceError::NotFound(format!("artist {} not found", artist_id)))?;
    }

    if !state.scanner.try_begin() {
        let status = state.library.get_scan_state()?.status;
        return Ok(Json(ScanStartResponse {
            started: false,
            status,
        }));
    }

    spawn_scan(
        ScanDeps {
            library: state.library.clone(),
            controller: state.scanner.clone(),
        },
        ScanOptions {
            root,
            recursive,
            max_depth: max_depth as u32,
            artist_id: request.artist_id,
        },
    );

    Ok(Json(ScanStartResponse {
        started: true,
        status: "running".to_string(),
    }))
}

pub async fn cancel_scan(
    State(state): State<AppState>,
) -> Result<Json<ScanCancelResponse>, ServiceError> {
    let cancelled = state.scanner.request_cancel();
    let status = state.library.get_scan_state()?.status;
    Ok(Json(ScanCancelResponse { cancelled, status }))
}

pub async fn scan_status(State(state): State<AppState>) -> Result<Json<ScanState>, ServiceError> {
    Ok(Json(state.library.get_scan_state()?))
}

pub async fn scan_skipped(
    State(state): State<AppState>,
    Query(query): Query<SkippedQuery>,
) -> Result<Json<Vec<SkippedFile>>, ServiceError> {
    let limit = query.limit.unwrap_or(DEFAULT_SKIPPED_LIMIT);
    if !(1..=MAX_SKIPPED_LIMIT).contains(&limit) {
        return Err(ServiceError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_SKIPPED_LIMIT
        )));
    }
    let scan_state = state.library.get_scan_state()?;
    let skips = match scan_state.started_at {
        Some(started_at) => state.library.list_skips(started_at, limit)?,
        None => Vec::new(),
    };
    Ok(Json(skips))
}
