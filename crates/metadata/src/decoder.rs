use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use common::Container;
use lofty::config::ParseOptions;
use lofty::file::{FileType, TaggedFile};
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use tracing::debug;

use crate::{guess_mime, CoverArt, MetadataError, TagDecoder, TagInfo};

/// One decoder per container format. Each reads only the tag kind native to
/// its container: ID3v2 frames for MP3, Vorbis comments for FLAC and the
/// `ilst` atom for MP4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatDecoder {
    Id3v2,
    VorbisComments,
    Mp4Ilst,
}

impl FormatDecoder {
    pub fn for_container(container: Container) -> Self {
        match container {
            Container::Mp3 => FormatDecoder::Id3v2,
            Container::Flac => FormatDecoder::VorbisComments,
            Container::Mp4 => FormatDecoder::Mp4Ilst,
        }
    }

    fn file_type(self) -> FileType {
        match self {
            FormatDecoder::Id3v2 => FileType::Mpeg,
            FormatDecoder::VorbisComments => FileType::Flac,
            FormatDecoder::Mp4Ilst => FileType::Mp4,
        }
    }

    fn tag_type(self) -> TagType {
        match self {
            FormatDecoder::Id3v2 => TagType::Id3v2,
            FormatDecoder::VorbisComments => TagType::VorbisComments,
            FormatDecoder::Mp4Ilst => TagType::Mp4Ilst,
        }
    }

    fn open(self, path: &Path) -> Result<TaggedFile, MetadataError> {
        let file = File::open(path)?;
        let tagged_file = Probe::new(BufReader::new(file))
            .set_file_type(self.file_type())
            .options(ParseOptions::new())
            .read()?;
        Ok(tagged_file)
    }

    fn native_tag(self, tagged_file: &TaggedFile) -> Option<&Tag> {
        tagged_file.tag(self.tag_type())
    }
}

impl TagDecoder for FormatDecoder {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        let tagged_file = self.open(path)?;
        debug!(
            "Parsed {:?} ({} ms)",
            path,
            tagged_file.properties().duration().as_millis()
        );

        let tag = match self.native_tag(&tagged_file) {
            Some(tag) => tag,
            None => {
                debug!("No {:?} tag in {:?}", self.tag_type(), path);
                return Ok(TagInfo::default());
            }
        };

        Ok(TagInfo {
            title: tag_text(tag, &ItemKey::TrackTitle),
            artist: tag_text(tag, &ItemKey::TrackArtist),
            album: tag_text(tag, &ItemKey::AlbumTitle),
            has_cover: !tag.pictures().is_empty(),
        })
    }

    fn read_cover(&self, path: &Path) -> Result<Option<CoverArt>, MetadataError> {
        let tagged_file = self.open(path)?;
        let picture = match self
            .native_tag(&tagged_file)
            .and_then(|tag| tag.pictures().first())
        {
            Some(picture) => picture,
            None => return Ok(None),
        };

        let data = picture.data().to_vec();
        let mime = picture
            .mime_type()
            .map(|mime| mime.as_str().to_string())
            .or_else(|| guess_mime(&data));
        Ok(Some(CoverArt { data, mime }))
    }
}

/// Decoder for extensions without tag support. Always reports defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDecoder;

impl TagDecoder for NoopDecoder {
    fn read_tags(&self, _path: &Path) -> Result<TagInfo, MetadataError> {
        Ok(TagInfo::default())
    }

    fn read_cover(&self, _path: &Path) -> Result<Option<CoverArt>, MetadataError> {
        Ok(None)
    }
}

// First value only; multi-valued fields keep their leading entry.
fn tag_text(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get_string(key).map(str::to_string)
}

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures {
    //! Minimal hand-assembled containers carrying real tag blocks.

    pub const FRONT_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
    pub const BACK_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 9, 8, 7];

    pub struct Picture<'a> {
        pub mime: &'a str,
        pub description: &'a str,
        pub pic_type: u8,
        pub data: &'a [u8],
    }

    fn id3_frame(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(body.len() + 10);
        out.extend_from_slice(id);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(body);
        out
    }

    fn id3_text(id: &[u8; 4], text: &str) -> Vec<u8> {
        let mut body = vec![0x00];
        body.extend_from_slice(text.as_bytes());
        id3_frame(id, &body)
    }

    fn id3_picture(picture: &Picture<'_>) -> Vec<u8> {
        let mut body = vec![0x00];
        body.extend_from_slice(picture.mime.as_bytes());
        body.push(0);
        body.push(picture.pic_type);
        body.extend_from_slice(picture.description.as_bytes());
        body.push(0);
        body.extend_from_slice(picture.data);
        id3_frame(b"APIC", &body)
    }

    fn syncsafe(value: usize) -> [u8; 4] {
        [
            ((value >> 21) & 0x7F) as u8,
            ((value >> 14) & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
            (value & 0x7F) as u8,
        ]
    }

    /// ID3v2.3 tag followed by a run of silent MPEG-1 Layer III frames
    /// (128 kbps, 44.1 kHz, 417 bytes each).
    pub fn mp3(texts: &[(&[u8; 4], &str)], pictures: &[Picture<'_>]) -> Vec<u8> {
        let mut frames = Vec::new();
        for (id, text) in texts {
            frames.extend(id3_text(id, text));
        }
        for picture in pictures {
            frames.extend(id3_picture(picture));
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"ID3");
        out.extend_from_slice(&[3, 0, 0]);
        out.extend_from_slice(&syncsafe(frames.len()));
        out.extend(frames);

        for _ in 0..16 {
            out.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
            out.extend(std::iter::repeat(0u8).take(417 - 4));
        }
        out
    }

    fn flac_block(block_type: u8, last: bool, body: &[u8]) -> Vec<u8> {
        let len = body.len() as u32;
        let mut out = vec![if last { 0x80 | block_type } else { block_type }];
        out.extend_from_slice(&len.to_be_bytes()[1..]);
        out.extend_from_slice(body);
        out
    }

    fn stream_info() -> Vec<u8> {
        let mut body = Vec::with_capacity(34);
        body.extend_from_slice(&4096u16.to_be_bytes());
        body.extend_from_slice(&4096u16.to_be_bytes());
        body.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        // 20 bits sample rate, 3 bits channels - 1, 5 bits bps - 1, 36 bits samples
        let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36) | 44_100;
        body.extend_from_slice(&packed.to_be_bytes());
        body.extend_from_slice(&[0u8; 16]);
        body
    }

    fn vorbis_comments(fields: &[(&str, &str)]) -> Vec<u8> {
        let vendor = b"fixture";
        let mut body = Vec::new();
        body.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        body.extend_from_slice(vendor);
        body.extend_from_slice(&(fields.len() as u32).to_le_bytes());
        for (key, value) in fields {
            let entry = format!("{}={}", key, value);
            body.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            body.extend_from_slice(entry.as_bytes());
        }
        body
    }

    fn flac_picture(picture: &Picture<'_>) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&u32::from(picture.pic_type).to_be_bytes());
        body.extend_from_slice(&(picture.mime.len() as u32).to_be_bytes());
        body.extend_from_slice(picture.mime.as_bytes());
        body.extend_from_slice(&(picture.description.len() as u32).to_be_bytes());
        body.extend_from_slice(picture.description.as_bytes());
        for value in [1u32, 1, 24, 0] {
            body.extend_from_slice(&value.to_be_bytes());
        }
        body.extend_from_slice(&(picture.data.len() as u32).to_be_bytes());
        body.extend_from_slice(picture.data);
        body
    }

    pub fn flac(fields: &[(&str, &str)], pictures: &[Picture<'_>]) -> Vec<u8> {
        let mut out = b"fLaC".to_vec();
        out.extend(flac_block(0, false, &stream_info()));
        out.extend(flac_block(4, pictures.is_empty(), &vorbis_comments(fields)));
        for (index, picture) in pictures.iter().enumerate() {
            let last = index + 1 == pictures.len();
            out.extend(flac_block(6, last, &flac_picture(picture)));
        }
        out.extend_from_slice(&[0u8; 64]);
        out
    }

    fn atom(ident: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(&(body.len() as u32 + 8).to_be_bytes());
        out.extend_from_slice(ident);
        out.extend_from_slice(body);
        out
    }

    fn full_atom(ident: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut full = vec![0u8; 4];
        full.extend_from_slice(body);
        atom(ident, &full)
    }

    fn handler(kind: &[u8; 4]) -> Vec<u8> {
        let mut body = vec![0u8; 4];
        body.extend_from_slice(kind);
        body.extend_from_slice(&[0u8; 12]);
        body.push(0);
        full_atom(b"hdlr", &body)
    }

    fn movie_header() -> Vec<u8> {
        let mut body = Vec::with_capacity(96);
        body.extend_from_slice(&[0u8; 8]);
        body.extend_from_slice(&44_100u32.to_be_bytes());
        body.extend_from_slice(&44_100u32.to_be_bytes());
        body.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        body.extend_from_slice(&0x0100u16.to_be_bytes());
        body.extend_from_slice(&[0u8; 10]);
        for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
            body.extend_from_slice(&value.to_be_bytes());
        }
        body.extend_from_slice(&[0u8; 24]);
        body.extend_from_slice(&2u32.to_be_bytes());
        full_atom(b"mvhd", &body)
    }

    fn audio_track() -> Vec<u8> {
        let mut media_header = Vec::with_capacity(20);
        media_header.extend_from_slice(&[0u8; 8]);
        media_header.extend_from_slice(&44_100u32.to_be_bytes());
        media_header.extend_from_slice(&44_100u32.to_be_bytes());
        media_header.extend_from_slice(&[0x55, 0xC4, 0, 0]);

        let mut media = full_atom(b"mdhd", &media_header);
        media.extend(handler(b"soun"));
        atom(b"trak", &atom(b"mdia", &media))
    }

    fn ilst_data(type_code: u32, payload: &[u8]) -> Vec<u8> {
        let mut body = type_code.to_be_bytes().to_vec();
        body.extend_from_slice(&[0u8; 4]);
        body.extend_from_slice(payload);
        atom(b"data", &body)
    }

    fn cover_type(mime: &str) -> u32 {
        match mime {
            "image/jpeg" => 13,
            "image/png" => 14,
            _ => 0,
        }
    }

    /// `ftyp`, a movie with one sound track, and an iTunes `ilst` under
    /// `moov/udta/meta`. `fields` use ilst idents such as `b"\xA9nam"`; all
    /// pictures go into a single `covr` item in order.
    pub fn m4a(fields: &[(&[u8; 4], &str)], pictures: &[Picture<'_>]) -> Vec<u8> {
        let mut items = Vec::new();
        for (ident, text) in fields {
            items.extend(atom(ident, &ilst_data(1, text.as_bytes())));
        }
        if !pictures.is_empty() {
            let mut covers = Vec::new();
            for picture in pictures {
                covers.extend(ilst_data(cover_type(picture.mime), picture.data));
            }
            items.extend(atom(b"covr", &covers));
        }

        let mut meta = handler(b"mdir");
        meta.extend(atom(b"ilst", &items));
        let udta = atom(b"udta", &full_atom(b"meta", &meta));

        let mut moov = movie_header();
        moov.extend(audio_track());
        moov.extend(udta);

        let mut out = atom(b"ftyp", b"M4A \0\0\0\0M4A isom");
        out.extend(atom(b"moov", &moov));
        out.extend(atom(b"mdat", &[0u8; 32]));
        out
    }
}
