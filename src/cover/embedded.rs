//! Persist cover art embedded in audio file tags.
//!
//! Pictures are written under the covers directory as `<sha256>.<ext>`, so
//! identical artwork shared by many files lands in exactly one file and a
//! rescan never rewrites it.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::metadata::EmbeddedPicture;

/// Extension used when the picture's format is unknown.
const DEFAULT_EXT: &str = "jpg";

/// Deterministic file name for picture bytes: `<sha256 hex>.<ext>`.
pub fn cover_file_name(data: &[u8], ext: &str) -> String {
    let hash = Sha256::digest(data);
    let ext = ext.trim_start_matches('.');
    let ext = if ext.is_empty() { DEFAULT_EXT } else { ext };
    format!("{:x}.{}", hash, ext.to_ascii_lowercase())
}

/// Write the picture under `covers_dir` unless an identical file already exists.
///
/// Returns the cover path and whether this call wrote it.
pub fn store_picture(covers_dir: &Path, picture: &EmbeddedPicture) -> io::Result<(PathBuf, bool)> {
    if picture.data.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "embedded picture is empty",
        ));
    }

    let path = covers_dir.join(cover_file_name(&picture.data, &picture.ext));
    if path.is_file() {
        return Ok((path, false));
    }

    fs::create_dir_all(covers_dir)?;
    fs::write(&path, &picture.data)?;
    tracing::debug!(target: "cover::embedded", path = %path.display(), "Saved embedded cover");
    Ok((path, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn picture(data: &[u8], ext: &str) -> EmbeddedPicture {
        EmbeddedPicture {
            data: data.to_vec(),
            ext: ext.to_string(),
        }
    }

    #[test]
    fn test_cover_file_name_is_content_addressed() {
        let a = cover_file_name(b"image bytes", "png");
        let b = cover_file_name(b"image bytes", ".png");
        let c = cover_file_name(b"other bytes", "png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), 64 + ".png".len());
    }

    #[test]
    fn test_unknown_ext_defaults_to_jpg() {
        assert!(cover_file_name(b"x", "").ends_with(".jpg"));
    }

    #[test]
    fn test_store_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let covers = temp.path().join(".covers");

        let (first, wrote_first) = store_picture(&covers, &picture(b"jpeg data", "jpg")).unwrap();
        let (second, wrote_second) = store_picture(&covers, &picture(b"jpeg data", "jpg")).unwrap();

        assert_eq!(first, second);
        assert!(wrote_first);
        assert!(!wrote_second);
        assert_eq!(std::fs::read(&first).unwrap(), b"jpeg data");
        assert_eq!(std::fs::read_dir(&covers).unwrap().count(), 1);
    }

    #[test]
    fn test_empty_picture_is_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(store_picture(temp.path(), &picture(b"", "jpg")).is_err());
    }
}
