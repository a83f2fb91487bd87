//! Embedded tag reading.
//!
//! Uses the lofty crate for format-independent metadata access across MP3,
//! FLAC, OGG, M4A and WAV. Only tags are read here; stream facts such as
//! duration and bit rate come from [`probe`](crate::probe).
//!
//! Reading goes through the [`TagReader`] trait so the scan can be driven by
//! fixtures in tests.

use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Raw-map keys for vendor-specific fields.
pub mod raw_keys {
    pub const DATE: &str = "date";
    pub const PERFORMER: &str = "performer";
    pub const LABEL: &str = "label";
    pub const COPYRIGHT: &str = "copyright";
    pub const ISRC: &str = "isrc";
    pub const UPC: &str = "upc";
}

/// A picture embedded in the file's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPicture {
    pub data: Vec<u8>,
    /// File extension without the dot (`jpg`, `png`, ...); empty when unknown
    pub ext: String,
}

/// Tag facts for one file. Missing tags are empty strings / zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFacts {
    pub title: String,
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub genre: String,
    pub composer: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub year: u32,
    pub picture: Option<EmbeddedPicture>,
    /// Vendor-specific fields keyed by [`raw_keys`]
    pub raw: BTreeMap<String, String>,
}

impl TagFacts {
    /// A raw field, or the empty string.
    pub fn raw(&self, key: &str) -> &str {
        self.raw.get(key).map(String::as_str).unwrap_or("")
    }

    /// Artist that owns the album: album-artist, then artist.
    pub fn album_owner(&self) -> Option<&str> {
        [self.album_artist.as_str(), self.artist.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}

/// Capability to read tag facts from a file.
pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<TagFacts>;
}

/// [`TagReader`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<TagFacts> {
        read(path)
    }
}

/// Read tag facts with lofty.
///
/// A file with no tag at all yields empty facts; a file lofty cannot parse is
/// an error.
pub fn read(path: &Path) -> Result<TagFacts> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, e.to_string()))?
        .read()
        .map_err(|e| Error::metadata(path, e.to_string()))?;

    // Get the primary tag, or fall back to the first available tag
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(TagFacts::default());
    };

    Ok(facts_from_tag(tag))
}

fn facts_from_tag(tag: &Tag) -> TagFacts {
    let text = |key: &ItemKey| tag.get_string(key).map(str::to_string).unwrap_or_default();

    let mut raw = BTreeMap::new();
    for (name, key) in [
        (raw_keys::DATE, ItemKey::RecordingDate),
        (raw_keys::PERFORMER, ItemKey::Performer),
        (raw_keys::LABEL, ItemKey::Label),
        (raw_keys::COPYRIGHT, ItemKey::CopyrightMessage),
        (raw_keys::ISRC, ItemKey::Isrc),
        (raw_keys::UPC, ItemKey::Barcode),
    ] {
        if let Some(value) = tag.get_string(&key).filter(|v| !v.is_empty()) {
            raw.insert(name.to_string(), value.to_string());
        }
    }

    TagFacts {
        title: tag.title().map(|s| s.to_string()).unwrap_or_default(),
        artist: tag.artist().map(|s| s.to_string()).unwrap_or_default(),
        album_artist: text(&ItemKey::AlbumArtist),
        album: tag.album().map(|s| s.to_string()).unwrap_or_default(),
        genre: tag.genre().map(|s| s.to_string()).unwrap_or_default(),
        composer: text(&ItemKey::Composer),
        track_number: tag.track().unwrap_or(0),
        disc_number: tag.disk().unwrap_or(0),
        year: tag.year().unwrap_or(0),
        picture: pick_picture(tag.pictures()).map(|p| EmbeddedPicture {
            data: p.data().to_vec(),
            ext: picture_ext(p.mime_type()).to_string(),
        }),
        raw,
    }
}

/// Prefer the front cover, fall back to the first picture.
fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .filter(|p| !p.data().is_empty())
}

fn picture_ext(mime: Option<&MimeType>) -> &'static str {
    match mime {
        Some(MimeType::Jpeg) => "jpg",
        Some(MimeType::Png) => "png",
        Some(MimeType::Gif) => "gif",
        Some(MimeType::Bmp) => "bmp",
        Some(MimeType::Tiff) => "tiff",
        _ => "",
    }
}
