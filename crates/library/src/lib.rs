mod music_file;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{is_allowed_extension, join_relpath, normalize_relpath};
use metadata::Decoders;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use music_file::{MusicEntry, MusicFile, TrackMetadata, UNKNOWN};

/// In-memory catalog over one music folder.
///
/// Cloning is cheap; clones share the folder and the cover cache.
#[derive(Clone)]
pub struct MusicLibrary {
    state: Arc<RwLock<LibraryState>>,
    decoders: Arc<Decoders>,
}

struct LibraryState {
    root: PathBuf,
    // Bumped on every folder change so covers decoded against an old root
    // are never stored.
    generation: u64,
    covers: HashMap<String, String>,
}

impl MusicLibrary {
    /// Opens `root`, creating it when absent.
    pub fn open(root: PathBuf) -> Result<Self, LibraryError> {
        Self::open_with_decoders(root, Decoders::standard())
    }

    pub fn open_with_decoders(root: PathBuf, decoders: Decoders) -> Result<Self, LibraryError> {
        if !root.exists() {
            fs::create_dir_all(&root)?;
            info!("Created music folder {:?}", root);
        }
        if !root.is_dir() {
            return Err(LibraryError::InvalidFolder(root));
        }
        Ok(Self {
            state: Arc::new(RwLock::new(LibraryState {
                root,
                generation: 0,
                covers: HashMap::new(),
            })),
            decoders: Arc::new(decoders),
        })
    }

    pub fn music_folder(&self) -> PathBuf {
        self.state.read().root.clone()
    }

    pub fn cover_cache_len(&self) -> usize {
        self.state.read().covers.len()
    }

    /// Switches to `folder` and drops every cached cover. Leaves the library
    /// untouched when `folder` is not an existing directory.
    pub fn set_music_folder(&self, folder: &Path) -> Result<(), LibraryError> {
        if !folder.is_dir() {
            return Err(LibraryError::InvalidFolder(folder.to_path_buf()));
        }
        let mut state = self.state.write();
        let dropped = state.covers.len();
        state.root = folder.to_path_buf();
        state.generation = state.generation.wrapping_add(1);
        state.covers.clear();
        info!(
            "Music folder set to {:?} ({} cached covers dropped)",
            folder, dropped
        );
        Ok(())
    }

    /// Every playable file below the folder, in per-directory name order.
    ///
    /// Directory links are not descended into, so a link cycle cannot make
    /// the walk run forever. File links are listed when their target stays
    /// inside the folder.
    pub fn music_files(&self) -> Vec<MusicEntry> {
        let root = self.music_folder();
        let canonical_root = root.canonicalize().ok();
        let mut entries = Vec::new();

        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, err);
                    continue;
                }
            };
            // `Path::is_file` follows links, unlike the entry's own file type.
            if !is_allowed_extension(entry.path()) || !entry.path().is_file() {
                continue;
            }
            if entry.path_is_symlink() && !is_within(canonical_root.as_deref(), entry.path()) {
                debug!("Skipping link outside music folder: {:?}", entry.path());
                continue;
            }
            entries.push(MusicFile::describe(entry.path(), &root, &self.decoders).entry());
        }

        debug!("Listed {} files under {:?}", entries.len(), root);
        entries
    }

    /// Resolves a relative path to a freshly loaded file. Paths that do not
    /// name a regular file inside the folder resolve to `None`.
    ///
    /// The returned `relative_path` is the normalized form of `relpath`, so
    /// `sub//a.mp3` and `./sub/a.mp3` both come back as `sub/a.mp3`.
    pub fn music_file(&self, relpath: &str) -> Option<MusicFile> {
        let root = self.music_folder();
        self.resolve(&root, relpath)
    }

    /// Base64 cover for `relpath`, served from the cache when present.
    /// Only hits are cached; a file without a cover is decoded again on the
    /// next request.
    pub fn cover_art(&self, relpath: &str) -> Option<String> {
        let key = normalize_relpath(relpath);
        let (root, generation) = {
            let state = self.state.read();
            if let Some(cover) = state.covers.get(&key) {
                return Some(cover.clone());
            }
            (state.root.clone(), state.generation)
        };

        let cover = self.resolve(&root, &key)?.cover_art()?;

        let mut state = self.state.write();
        if state.generation == generation {
            state.covers.insert(key, cover.clone());
        }
        Some(cover)
    }

    /// Location on disk of a playable file, without reading its tags.
    pub fn file_path(&self, relpath: &str) -> Option<PathBuf> {
        let root = self.music_folder();
        contained_file(&root, relpath)
    }

    fn resolve(&self, root: &Path, relpath: &str) -> Option<MusicFile> {
        let full_path = contained_file(root, relpath)?;
        Some(MusicFile::open(&full_path, root, &self.decoders))
    }
}

impl std::fmt::Debug for MusicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MusicLibrary")
            .field("root", &state.root)
            .field("cached_covers", &state.covers.len())
            .field("decoders", &self.decoders)
            .finish()
    }
}

fn contained_file(root: &Path, relpath: &str) -> Option<PathBuf> {
    let full_path = join_relpath(root, relpath)?;
    let is_file = fs::metadata(&full_path)
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return None;
    }
    // Symlinks inside the folder may still point outside it.
    if !is_within(root.canonicalize().ok().as_deref(), &full_path) {
        warn!("Rejected path outside music folder: {}", relpath);
        return None;
    }
    Some(full_path)
}

fn is_within(canonical_root: Option<&Path>, path: &Path) -> bool {
    match (canonical_root, path.canonicalize()) {
        (Some(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    InvalidFolder(PathBuf),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::InvalidFolder(path) => {
                write!(f, "not a directory: {}", path.display())
            }
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}
