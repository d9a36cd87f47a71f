use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MUSIC_FOLDER: &str = "musique";
pub const DEFAULT_LYRICS_API_BASE: &str = "https://api.lyrics.ovh/v1";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub music_folder: String,
    pub bind_addr: String,
    pub port: u16,
    pub web_root: String,
    pub lyrics_api_base: String,
    pub lyrics_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            music_folder: DEFAULT_MUSIC_FOLDER.to_string(),
            bind_addr: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            web_root: "web".to_string(),
            lyrics_api_base: DEFAULT_LYRICS_API_BASE.to_string(),
            lyrics_timeout_secs: 10,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("MUSIC_PLAYER_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Reads the config at `path`, writing the defaults there first when the
/// file does not exist. The flag is true when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        normalize(&mut config);
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

fn normalize(config: &mut ServerConfig) {
    let defaults = ServerConfig::default();
    if config.music_folder.trim().is_empty() {
        config.music_folder = defaults.music_folder;
    }
    if config.bind_addr.trim().is_empty() {
        config.bind_addr = defaults.bind_addr;
    }
    if config.port == 0 {
        config.port = defaults.port;
    }
    if config.web_root.trim().is_empty() {
        config.web_root = defaults.web_root;
    }
    let base = config.lyrics_api_base.trim().trim_end_matches('/');
    config.lyrics_api_base = if base.is_empty() {
        defaults.lyrics_api_base
    } else {
        base.to_string()
    };
    if config.lyrics_timeout_secs == 0 {
        config.lyrics_timeout_secs = defaults.lyrics_timeout_secs;
    }
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Resolves `value` against the directory holding the config file unless it
/// is already absolute.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}
