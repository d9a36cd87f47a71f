use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use library::MusicLibrary;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::lyrics::LyricsClient;

#[derive(Clone)]
pub struct AppState {
    pub library: MusicLibrary,
    pub config_path: PathBuf,
    pub config: Arc<RwLock<ServerConfig>>,
    pub lyrics: LyricsClient,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct CoverResponse {
    pub cover: String,
}

#[derive(Serialize)]
pub struct LyricsResponse {
    pub lyrics: String,
}

#[derive(Serialize)]
pub struct LyricsErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct FolderForm {
    pub folder: Option<String>,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
