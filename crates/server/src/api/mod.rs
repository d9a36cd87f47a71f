pub mod library;
pub mod lyrics;
pub mod player;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;
use tracing::{debug, error};

use crate::state::{AppState, ErrorResponse, HealthResponse};
use crate::utils::{apply_template, escape_html, html_response, json_error, load_template, web_root};

const FALLBACK_INDEX: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Music</title></head>
<body>
<h1>Music</h1>
<form method="post" action="/set_music_folder">
  <input name="folder" value="{{music_folder}}" size="60">
  <button type="submit">Change folder</button>
</form>
<p>Tracks are listed at <a href="/list">/list</a>.</p>
</body>
</html>
"#;

pub fn app_router(state: AppState) -> Router {
    let static_dir = web_root(&state).join("static");
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/list", get(library::list_music))
        .route("/metadata/*path", get(library::get_metadata))
        .route("/cover/*path", get(library::get_cover))
        .route("/set_music_folder", post(library::set_music_folder))
        .route("/play/*path", get(player::play))
        .route("/lyrics/*path", get(lyrics::get_lyrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Response {
    let template = load_template(&state, "index.html").unwrap_or_else(|err| {
        debug!("Using built-in index page: {}", err);
        FALLBACK_INDEX.to_string()
    });
    let folder = state.library.music_folder().to_string_lossy().to_string();
    let body = apply_template(template, &[("music_folder", escape_html(&folder))]);
    html_response(StatusCode::OK, body)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Runs filesystem and tag work off the async workers.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, (StatusCode, Json<ErrorResponse>)>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        error!("Blocking task failed: {}", err);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use http_body_util::BodyExt;
    use metadata::fixtures;
    use parking_lot::RwLock;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{load_or_create_config, ServerConfig};
    use crate::lyrics::LyricsClient;

    struct TestApp {
        _dir: tempfile::TempDir,
        base: PathBuf,
        music: PathBuf,
        state: AppState,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_lyrics_api("http://127.0.0.1:9/v1")
        }

        fn with_lyrics_api(lyrics_api_base: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let base = dir.path().to_path_buf();
            let music = base.join("music");
            let config = ServerConfig {
                music_folder: music.to_string_lossy().to_string(),
                web_root: base.join("web").to_string_lossy().to_string(),
                lyrics_api_base: lyrics_api_base.to_string(),
                ..ServerConfig::default()
            };
            let state = AppState {
                library: ::library::MusicLibrary::open(music.clone()).unwrap(),
                config_path: base.join("config.yaml"),
                config: Arc::new(RwLock::new(config)),
                lyrics: LyricsClient::new(
                    reqwest::Client::new(),
                    lyrics_api_base,
                    Duration::from_secs(5),
                ),
            };
            Self {
                _dir: dir,
                base,
                music,
                state,
            }
        }

        fn write(&self, relpath: &str, bytes: &[u8]) {
            let path = self.music.join(relpath);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, bytes).unwrap();
        }

        async fn get(&self, uri: &str) -> Response {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn send(&self, request: Request<Body>) -> Response {
            app_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap()
        }
    }

    fn tagged_mp3(artist: &str, title: &str, with_cover: bool) -> Vec<u8> {
        let pictures = if with_cover {
            vec![fixtures::Picture {
                mime: "image/png",
                description: "",
                pic_type: 3,
                data: fixtures::FRONT_PNG,
            }]
        } else {
            Vec::new()
        };
        fixtures::mp3(
            &[(b"TIT2", title), (b"TPE1", artist), (b"TALB", "Discovery")],
            &pictures,
        )
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = TestApp::new();
        let response = app.get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn list_contains_only_audio_files() {
        let app = TestApp::new();
        app.write("a.mp3", b"");
        app.write("b.txt", b"notes");
        app.write("sub/c.flac", b"");

        let response = app.get("/list").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!([
                { "path": "a.mp3", "name": "a", "folder": "" },
                { "path": "sub/c.flac", "name": "c", "folder": "sub" },
            ])
        );
    }

    #[tokio::test]
    async fn metadata_reads_tags() {
        let app = TestApp::new();
        app.write("Daft Punk/one.mp3", &tagged_mp3("Daft Punk", "One More Time", true));

        let response = app.get("/metadata/Daft%20Punk/one.mp3").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "title": "One More Time",
                "artist": "Daft Punk",
                "album": "Discovery",
                "has_cover": true,
            })
        );
    }

    #[tokio::test]
    async fn metadata_for_missing_or_escaping_paths_is_404() {
        let app = TestApp::new();
        fs::write(app.base.join("secret.mp3"), b"").unwrap();

        for uri in ["/metadata/nope.mp3", "/metadata/%2E%2E/secret.mp3"] {
            let response = app.get(uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body_json(response).await, json!({ "error": "file not found" }));
        }
    }

    #[tokio::test]
    async fn cover_is_base64_of_first_picture() {
        let app = TestApp::new();
        app.write("with.mp3", &tagged_mp3("A", "B", true));
        app.write("without.mp3", &tagged_mp3("A", "B", false));

        let response = app.get("/cover/with.mp3").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let cover = body["cover"].as_str().unwrap();
        assert_eq!(STANDARD.decode(cover).unwrap(), fixtures::FRONT_PNG);
        assert_eq!(app.state.library.cover_cache_len(), 1);

        let response = app.get("/cover/without.mp3").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "no cover available" }));
        assert_eq!(app.state.library.cover_cache_len(), 1);
    }

    fn folder_form(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/set_music_folder")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn set_music_folder_redirects_and_persists() {
        let app = TestApp::new();
        let other = app.base.join("other");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("x.ogg"), b"").unwrap();

        let response = app
            .send(folder_form(format!("folder={}", other.display())))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(app.state.library.music_folder(), other);

        let (saved, created) = load_or_create_config(&app.state.config_path).unwrap();
        assert!(!created);
        assert_eq!(
            Path::new(&saved.music_folder),
            other.canonicalize().unwrap().as_path()
        );

        let body = body_json(app.get("/list").await).await;
        assert_eq!(body[0]["path"], "x.ogg");
    }

    #[tokio::test]
    async fn set_music_folder_rejects_bad_input() {
        let app = TestApp::new();
        let missing = app.base.join("missing");

        for body in [format!("folder={}", missing.display()), String::new()] {
            let response = app.send(folder_form(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({ "error": "invalid folder" }));
        }
        assert_eq!(app.state.library.music_folder(), app.music);
        assert!(!app.state.config_path.exists());
    }

    #[tokio::test]
    async fn play_streams_whole_file() {
        let app = TestApp::new();
        let bytes = tagged_mp3("A", "B", false);
        app.write("song.mp3", &bytes);

        let response = app.get("/play/song.mp3").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            bytes.len().to_string().as_str()
        );
        assert_eq!(body_bytes(response).await, bytes);
    }

    #[tokio::test]
    async fn play_honours_single_range() {
        let app = TestApp::new();
        let bytes = tagged_mp3("A", "B", false);
        app.write("song.mp3", &bytes);
        let size = bytes.len();

        let response = app
            .send(
                Request::builder()
                    .uri("/play/song.mp3")
                    .header(header::RANGE, "bytes=4-9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            format!("bytes 4-9/{}", size).as_str()
        );
        assert_eq!(body_bytes(response).await, bytes[4..10].to_vec());

        let response = app
            .send(
                Request::builder()
                    .uri("/play/song.mp3")
                    .header(header::RANGE, format!("bytes={}-", size + 10))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            format!("bytes */{}", size).as_str()
        );
    }

    #[tokio::test]
    async fn play_missing_file_is_404() {
        let app = TestApp::new();
        let response = app.get("/play/ghost.flac").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn fake_lyrics_api() -> SocketAddr {
        use axum::extract::Path as AxumPath;

        async fn song(AxumPath((artist, title)): AxumPath<(String, String)>) -> Response {
            match (artist.as_str(), title.as_str()) {
                ("daft_punk", "one_more_time") => {
                    Json(json!({ "lyrics": "One more time\nWe're gonna celebrate" }))
                        .into_response()
                }
                ("daft_punk", "odd") => Json(json!({ "message": "nope" })).into_response(),
                ("daft_punk", "busy") => StatusCode::BAD_GATEWAY.into_response(),
                _ => StatusCode::NOT_FOUND.into_response(),
            }
        }

        let app = Router::new().route("/v1/:artist/:title", get(song));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn lyrics_are_fetched_with_sanitized_names() {
        let addr = fake_lyrics_api().await;
        let app = TestApp::with_lyrics_api(&format!("http://{}/v1", addr));
        app.write("one.mp3", &tagged_mp3("Daft Punk", "One More Time!", false));

        let response = app.get("/lyrics/one.mp3").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "lyrics": "One more time\nWe're gonna celebrate" })
        );
    }

    #[tokio::test]
    async fn lyrics_failures_map_to_status_codes() {
        let addr = fake_lyrics_api().await;
        let app = TestApp::with_lyrics_api(&format!("http://{}/v1", addr));
        app.write("missing.mp3", &tagged_mp3("Daft Punk", "Unreleased", false));
        app.write("odd.mp3", &tagged_mp3("Daft Punk", "Odd", false));
        app.write("busy.mp3", &tagged_mp3("Daft Punk", "Busy", false));
        app.write("blank.mp3", &tagged_mp3("!!!", "Title", false));

        let response = app.get("/lyrics/ghost.mp3").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "file not found" }));

        let response = app.get("/lyrics/blank.mp3").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "could not determine artist or title" })
        );

        let response = app.get("/lyrics/missing.mp3").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "lyrics not found" }));

        let response = app.get("/lyrics/odd.mp3").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "lyrics not found", "details": { "message": "nope" } })
        );

        let response = app.get("/lyrics/busy.mp3").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn index_falls_back_to_built_in_page() {
        let app = TestApp::new();
        fs::create_dir_all(app.base.join("web")).unwrap();

        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("Tracks are listed at"));
        assert!(body.contains("/set_music_folder"));
        assert!(body.contains(&app.music.to_string_lossy().to_string()));
    }

    #[tokio::test]
    async fn index_and_static_files_come_from_web_root() {
        let app = TestApp::new();
        let web = app.base.join("web");
        fs::create_dir_all(web.join("static")).unwrap();
        fs::write(web.join("index.html"), "<p>{{music_folder}}</p>").unwrap();
        fs::write(web.join("static").join("app.js"), "console.log(1);").unwrap();

        let body = body_bytes(app.get("/").await).await;
        assert_eq!(
            String::from_utf8(body).unwrap(),
            format!("<p>{}</p>", app.music.display())
        );

        let response = app.get("/static/app.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"console.log(1);".to_vec());
    }
}
