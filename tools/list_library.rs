use std::env;
use std::path::PathBuf;

use library::MusicLibrary;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let music_folder = env::args()
        .nth(1)
        .or_else(|| env::var("MUSIC_FOLDER").ok())
        .ok_or("MUSIC_FOLDER not set and no path argument")?;
    let music_folder = PathBuf::from(music_folder);
    if !music_folder.is_dir() {
        return Err(format!("not a directory: {}", music_folder.display()).into());
    }

    let library = MusicLibrary::open(music_folder)?;
    let entries = library.music_files();
    info!("Found {} audio files in {:?}", entries.len(), library.music_folder());

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
