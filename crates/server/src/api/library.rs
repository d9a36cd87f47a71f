use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Response,
    Form, Json,
};
use library::{MusicEntry, TrackMetadata};
use tracing::{info, warn};

use crate::config::save_config;
use crate::state::{AppState, CoverResponse, FolderForm, JsonResult};
use crate::utils::{json_error, json_error_response, redirect_to};

use super::run_blocking;

pub async fn list_music(State(state): State<AppState>) -> JsonResult<Vec<MusicEntry>> {
    let library = state.library.clone();
    let entries = run_blocking(move || library.music_files()).await?;
    Ok(Json(entries))
}

pub async fn get_metadata(
    State(state): State<AppState>,
    AxumPath(relpath): AxumPath<String>,
) -> JsonResult<TrackMetadata> {
    let library = state.library.clone();
    let file = run_blocking(move || library.music_file(&relpath)).await?;
    match file {
        Some(file) => Ok(Json(file.metadata())),
        None => Err(json_error(StatusCode::NOT_FOUND, "file not found")),
    }
}

pub async fn get_cover(
    State(state): State<AppState>,
    AxumPath(relpath): AxumPath<String>,
) -> JsonResult<CoverResponse> {
    let library = state.library.clone();
    let cover = run_blocking(move || library.cover_art(&relpath)).await?;
    match cover {
        Some(cover) => Ok(Json(CoverResponse { cover })),
        None => Err(json_error(StatusCode::NOT_FOUND, "no cover available")),
    }
}

pub async fn set_music_folder(
    State(state): State<AppState>,
    Form(form): Form<FolderForm>,
) -> Response {
    let folder = match form.folder.as_deref().map(str::trim) {
        Some(folder) if !folder.is_empty() => std::path::PathBuf::from(folder),
        _ => return json_error_response(StatusCode::BAD_REQUEST, "invalid folder"),
    };

    if let Err(err) = state.library.set_music_folder(&folder) {
        info!("Refused music folder change: {}", err);
        return json_error_response(StatusCode::BAD_REQUEST, "invalid folder");
    }

    let stored = folder.canonicalize().unwrap_or(folder);
    let config = {
        let mut config = state.config.write();
        config.music_folder = stored.to_string_lossy().to_string();
        config.clone()
    };
    if let Err(err) = save_config(&state.config_path, &config) {
        warn!("Failed to persist music folder: {}", err);
    }

    redirect_to("/")
}
