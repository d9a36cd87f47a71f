mod decoder;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::{Container, ALLOWED_EXTENSIONS};
use lofty::error::LoftyError;

#[cfg(any(test, feature = "fixtures"))]
pub use decoder::fixtures;
pub use decoder::{FormatDecoder, NoopDecoder};

/// Display tags read from one file. `None` means the tag was absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub has_cover: bool,
}

#[derive(Debug, Clone)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

impl CoverArt {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Uniform extraction contract shared by every container format.
pub trait TagDecoder: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError>;

    /// Raw bytes of the first embedded picture, if any.
    fn read_cover(&self, path: &Path) -> Result<Option<CoverArt>, MetadataError>;
}

/// Lookup table from lowercase extension to decoder.
///
/// Extensions without an entry resolve to [`NoopDecoder`].
#[derive(Clone)]
pub struct Decoders {
    by_extension: HashMap<String, Arc<dyn TagDecoder>>,
    fallback: Arc<dyn TagDecoder>,
}

impl Decoders {
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
            fallback: Arc::new(NoopDecoder),
        }
    }

    pub fn standard() -> Self {
        let mut decoders = Self::empty();
        for ext in ALLOWED_EXTENSIONS {
            if let Some(container) = Container::from_extension(ext) {
                decoders = decoders.with(ext, Arc::new(FormatDecoder::for_container(container)));
            }
        }
        decoders
    }

    pub fn with(mut self, extension: &str, decoder: Arc<dyn TagDecoder>) -> Self {
        self.by_extension
            .insert(extension.to_ascii_lowercase(), decoder);
        self
    }

    pub fn get(&self, extension: &str) -> Arc<dyn TagDecoder> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for Decoders {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Decoders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.by_extension.keys().collect();
        keys.sort();
        f.debug_struct("Decoders").field("extensions", &keys).finish()
    }
}

pub(crate) fn guess_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg".to_string())
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png".to_string())
    } else {
        None
    }
}
