use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{lowercase_extension, path_to_slash_string, relpath_from};
use metadata::{Decoders, TagDecoder, TagInfo};
use serde::Serialize;
use tracing::warn;

pub const UNKNOWN: &str = "Unknown";

/// Listing view of a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MusicEntry {
    pub path: String,
    pub name: String,
    pub folder: String,
}

/// Detail view of a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub has_cover: bool,
}

/// One audio file under a library root.
///
/// Path attributes are fixed at construction against the root that was
/// current at the time; an instance must not outlive a folder change.
#[derive(Clone)]
pub struct MusicFile {
    pub full_path: PathBuf,
    pub relative_path: String,
    pub name: String,
    pub extension: String,
    pub folder: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub has_cover: bool,
    decoder: Arc<dyn TagDecoder>,
}

impl MusicFile {
    /// Builds the file and loads its tags. Unreadable tags leave the defaults
    /// in place.
    pub fn open(path: &Path, root: &Path, decoders: &Decoders) -> Self {
        let mut file = Self::describe(path, root, decoders);
        file.load_metadata();
        file
    }

    /// Path attributes only; tags are not read.
    pub fn describe(path: &Path, root: &Path, decoders: &Decoders) -> Self {
        let extension = lowercase_extension(path);
        let relative_path =
            relpath_from(root, path).unwrap_or_else(|| path_to_slash_string(path));
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let folder = match path.parent() {
            Some(parent) if parent != root => relpath_from(root, parent).unwrap_or_default(),
            _ => String::new(),
        };

        Self {
            full_path: path.to_path_buf(),
            relative_path,
            title: name.clone(),
            name,
            decoder: decoders.get(&extension),
            extension,
            folder,
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            has_cover: false,
        }
    }

    fn load_metadata(&mut self) {
        match self.decoder.read_tags(&self.full_path) {
            Ok(info) => self.apply_tags(info),
            Err(err) => warn!(
                "Failed to read tags for {}: {}",
                self.relative_path, err
            ),
        }
    }

    fn apply_tags(&mut self, info: TagInfo) {
        if let Some(title) = info.title {
            self.title = title;
        }
        if let Some(artist) = info.artist {
            self.artist = artist;
        }
        if let Some(album) = info.album {
            self.album = album;
        }
        self.has_cover = info.has_cover;
    }

    /// First embedded image, base64-encoded. Re-reads the file on every call.
    pub fn cover_art(&self) -> Option<String> {
        match self.decoder.read_cover(&self.full_path) {
            Ok(Some(cover)) => Some(cover.to_base64()),
            Ok(None) => None,
            Err(err) => {
                warn!("Failed to read cover for {}: {}", self.relative_path, err);
                None
            }
        }
    }

    pub fn entry(&self) -> MusicEntry {
        MusicEntry {
            path: self.relative_path.clone(),
            name: self.name.clone(),
            folder: self.folder.clone(),
        }
    }

    pub fn metadata(&self) -> TrackMetadata {
        TrackMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            has_cover: self.has_cover,
        }
    }
}

impl std::fmt::Debug for MusicFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicFile")
            .field("relative_path", &self.relative_path)
            .field("extension", &self.extension)
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("album", &self.album)
            .field("has_cover", &self.has_cover)
            .finish()
    }
}
