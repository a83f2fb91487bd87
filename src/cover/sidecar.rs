//! Detect cover art files sitting next to the audio files.
//!
//! Conventional names are tried first, in priority order:
//! - cover.jpg, cover.jpeg, cover.png
//! - folder.jpg, folder.jpeg, folder.png
//! - album.jpg, album.jpeg, album.png
//! - front.jpg, front.jpeg, front.png
//!
//! Matching is case-insensitive. Failing that, the first image file in
//! file-name order is used.

use std::path::{Path, PathBuf};

/// Conventional cover file stems, highest priority first
const COVER_FILENAMES: &[&str] = &["cover", "folder", "album", "front"];

/// Extensions tried for conventional names
const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions accepted for the first-image fallback
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Check if a path has an image extension (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Find a cover image in `dir`. Reads the directory once.
///
/// Returns None if the directory has no image or cannot be read.
pub fn find_cover_in_dir(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for stem in COVER_FILENAMES {
        for ext in COVER_EXTENSIONS {
            let wanted = format!("{stem}.{ext}");
            if let Some(path) = files.iter().find(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(&wanted))
            }) {
                return Some(path.clone());
            }
        }
    }

    files.into_iter().find(|path| is_image_file(path))
}
