mod api;
mod config;
mod lyrics;
mod range;
mod state;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use api::app_router;
use config::{config_path_from_env, load_or_create_config, resolve_path};
use library::MusicLibrary;
use lyrics::LyricsClient;
use parking_lot::RwLock;
use reqwest::Client;
use state::AppState;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let music_folder = resolve_path(&config_path, &config.music_folder);
    let library = MusicLibrary::open(music_folder)?;
    info!("Serving music from {:?}", library.music_folder());

    let http_client = Client::builder()
        .user_agent(concat!("music-player/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let lyrics = LyricsClient::new(
        http_client,
        &config.lyrics_api_base,
        Duration::from_secs(config.lyrics_timeout_secs),
    );

    let bind_addr = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState {
        library,
        config_path,
        config: Arc::new(RwLock::new(config)),
        lyrics,
    };

    let app = app_router(state)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for ctrl-c: {}", err);
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
