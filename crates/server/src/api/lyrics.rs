use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::lyrics::{sanitize_component, LyricsError};
use crate::state::{AppState, LyricsErrorResponse, LyricsResponse};
use crate::utils::json_error_response;

use super::run_blocking;

pub async fn get_lyrics(
    State(state): State<AppState>,
    AxumPath(relpath): AxumPath<String>,
) -> Response {
    let library = state.library.clone();
    let file = match run_blocking(move || library.music_file(&relpath)).await {
        Ok(Some(file)) => file,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "file not found"),
        Err(err) => return err.into_response(),
    };

    let artist = sanitize_component(&file.artist);
    let title = sanitize_component(&file.title);
    if artist.is_empty() || title.is_empty() {
        return json_error_response(StatusCode::NOT_FOUND, "could not determine artist or title");
    }

    match state.lyrics.fetch(&artist, &title).await {
        Ok(lyrics) => Json(LyricsResponse { lyrics }).into_response(),
        Err(err) => {
            if !matches!(err, LyricsError::NotFound { .. }) {
                warn!("Lyrics lookup for {}/{} failed: {}", artist, title, err);
            }
            let status = err.status_code();
            let details = match err {
                LyricsError::NotFound { ref details } => details.clone(),
                _ => None,
            };
            (
                status,
                Json(LyricsErrorResponse {
                    error: err.to_string(),
                    details,
                }),
            )
                .into_response()
        }
    }
}
