use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Extensions the library lists as playable.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["mp3", "flac", "wav", "ogg", "m4a", "aac"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp3,
    Flac,
    Mp4,
}

impl Container {
    /// Container whose tag layout applies to files with this (lowercase) extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mp3" => Some(Container::Mp3),
            "flac" => Some(Container::Flac),
            "m4a" | "aac" => Some(Container::Mp4),
            _ => None,
        }
    }
}

pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_allowed_extension(path: &Path) -> bool {
    let ext = lowercase_extension(path);
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

/// Joins a `/`-separated relative path onto `root`.
///
/// Returns `None` for absolute paths and for any `..` segment, so the result
/// always stays lexically below `root`. Empty and `.` segments are skipped.
pub fn join_relpath(root: &Path, relpath: &str) -> Option<PathBuf> {
    if relpath.starts_with(['/', '\\']) {
        return None;
    }
    let mut out = PathBuf::from(root);
    let mut pushed = false;
    for part in relpath.split(['/', '\\']) {
        if part.is_empty() {
            continue;
        }
        match Path::new(part).components().next() {
            Some(Component::Normal(_)) => {
                out.push(part);
                pushed = true;
            }
            Some(Component::CurDir) => continue,
            _ => return None,
        }
    }
    pushed.then_some(out)
}

/// Normalized form of a relative path: the segments `join_relpath` keeps,
/// joined with `/`.
pub fn normalize_relpath(relpath: &str) -> String {
    relpath
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

pub fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
