use std::time::Duration;

use axum::http::StatusCode;
use reqwest::{Client, Url};
use serde_json::Value;

/// Client for a lyrics.ovh style API: `GET {base}/{artist}/{title}` answering
/// `{"lyrics": "..."}`.
#[derive(Clone, Debug)]
pub struct LyricsClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug)]
pub enum LyricsError {
    /// The API has no lyrics for this song. `details` holds the API body when
    /// it answered successfully without a `lyrics` field.
    NotFound { details: Option<Value> },
    Status(StatusCode),
    Transport(String),
    Parse(String),
}

impl LyricsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LyricsError::NotFound { .. } => StatusCode::NOT_FOUND,
            LyricsError::Status(_) | LyricsError::Transport(_) | LyricsError::Parse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for LyricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LyricsError::NotFound { .. } => write!(f, "lyrics not found"),
            LyricsError::Status(status) => write!(f, "http error: {}", status),
            LyricsError::Transport(err) => write!(f, "connection error: {}", err),
            LyricsError::Parse(err) => write!(f, "failed to parse response: {}", err),
        }
    }
}

impl std::error::Error for LyricsError {}

impl LyricsClient {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Looks up lyrics for already sanitized artist and title components.
    pub async fn fetch(&self, artist: &str, title: &str) -> Result<String, LyricsError> {
        let url = self.song_url(artist, title)?;
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| LyricsError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LyricsError::NotFound { details: None });
        }
        if !status.is_success() {
            return Err(LyricsError::Status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|err| LyricsError::Transport(err.to_string()))?;
        let value: Value =
            serde_json::from_str(&body).map_err(|err| LyricsError::Parse(err.to_string()))?;
        match value.get("lyrics").and_then(Value::as_str) {
            Some(lyrics) => Ok(lyrics.to_string()),
            None => Err(LyricsError::NotFound {
                details: Some(value),
            }),
        }
    }

    fn song_url(&self, artist: &str, title: &str) -> Result<Url, LyricsError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| LyricsError::Transport(format!("bad lyrics api url: {}", err)))?;
        url.path_segments_mut()
            .map_err(|_| LyricsError::Transport("lyrics api url cannot take a path".to_string()))?
            .pop_if_empty()
            .push(artist)
            .push(title);
        Ok(url)
    }
}

/// Lowercases and trims, keeps letters, digits and whitespace, then turns
/// spaces into underscores.
pub fn sanitize_component(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
        .map(|ch| if ch == ' ' { '_' } else { ch })
        .collect()
}
