//! Cover art resolution for a scan pass.
//!
//! Resolves one cover image path per directory, with priority:
//!
//! 1. **Memo** - a directory already resolved in this pass returns the same answer
//! 2. **Embedded tags** - picture bytes are stored under the covers directory,
//!    named by content hash
//! 3. **Sidecar files** - cover.jpg, folder.png, ... or the first image in the directory
//!
//! A [`CoverResolver`] lives for exactly one scan and is dropped with it, so
//! each directory is scanned at most once and each embedded picture is
//! written at most once per pass, no matter how many tracks share it.

mod embedded;
mod sidecar;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::metadata::EmbeddedPicture;

pub use embedded::{cover_file_name, store_picture};
pub use sidecar::{IMAGE_EXTENSIONS, find_cover_in_dir, is_image_file};

/// Name of the covers directory created under the library root.
pub const COVERS_DIR_NAME: &str = ".covers";

/// Where a resolved cover came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSource {
    /// Extracted from the audio file's tags
    Embedded,
    /// An image file in the track's directory
    Sidecar,
}

/// Per-scan cover resolver with a directory memo.
#[derive(Debug)]
pub struct CoverResolver {
    covers_dir: PathBuf,
    memo: HashMap<PathBuf, Option<(PathBuf, CoverSource)>>,
    writes: usize,
}

impl CoverResolver {
    /// Create a resolver that stores embedded pictures under `covers_dir`.
    pub fn new(covers_dir: impl Into<PathBuf>) -> Self {
        Self {
            covers_dir: covers_dir.into(),
            memo: HashMap::new(),
            writes: 0,
        }
    }

    /// Resolve the cover for `dir`, preferring the embedded picture.
    ///
    /// Returns None when neither an embedded picture nor an image file is
    /// available. Both hits and misses are memoized for the directory.
    pub fn resolve(&mut self, dir: &Path, picture: Option<&EmbeddedPicture>) -> Option<PathBuf> {
        if let Some(cached) = self.memo.get(dir) {
            return cached.as_ref().map(|(path, _)| path.clone());
        }

        let resolved = self.resolve_uncached(dir, picture);
        if let Some((path, source)) = &resolved {
            tracing::debug!(
                target: "cover::resolve",
                dir = %dir.display(),
                cover = %path.display(),
                ?source,
                "Resolved cover"
            );
        }
        let result = resolved.as_ref().map(|(path, _)| path.clone());
        self.memo.insert(dir.to_path_buf(), resolved);
        result
    }

    fn resolve_uncached(
        &mut self,
        dir: &Path,
        picture: Option<&EmbeddedPicture>,
    ) -> Option<(PathBuf, CoverSource)> {
        if let Some(picture) = picture.filter(|p| !p.data.is_empty()) {
            match store_picture(&self.covers_dir, picture) {
                Ok((path, wrote)) => {
                    if wrote {
                        self.writes += 1;
                    }
                    return Some((path, CoverSource::Embedded));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "cover::resolve",
                        dir = %dir.display(),
                        error = %e,
                        "Failed to save embedded cover, trying directory images"
                    );
                }
            }
        }

        find_cover_in_dir(dir).map(|path| (path, CoverSource::Sidecar))
    }

    /// Where the cover for `dir` came from, if it has been resolved.
    pub fn source_of(&self, dir: &Path) -> Option<CoverSource> {
        self.memo.get(dir)?.as_ref().map(|(_, source)| *source)
    }

    /// Number of cover files written during this pass.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Number of directories resolved during this pass.
    pub fn resolved_dirs(&self) -> usize {
        self.memo.len()
    }
}
