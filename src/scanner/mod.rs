//! Library tree walking and audio path classification.
//!
//! The walk runs on the blocking pool and feeds a bounded channel, which is
//! exposed to the async side as a [`Stream`] of [`WalkEntry`] values. Every
//! regular file is reported, not just audio, because the orchestrator needs
//! the full set of files present on disk for pruning.

use futures::stream::Stream;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Extensions (lowercase) accepted as candidate audio files.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "ogg", "wav"];

/// Check if a path has an audio file extension (case-insensitive).
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// One item produced by the walk.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkEntry {
    /// A regular file (any type)
    File(PathBuf),
    /// An entry that could not be read; the walk continues past it
    Error(String),
}

/// Walks `root` depth-first in file-name order.
///
/// Directories are not reported. Unreadable entries become
/// [`WalkEntry::Error`] and do not stop the traversal.
pub fn walk(root: PathBuf) -> impl Stream<Item = WalkEntry> {
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let item = match entry {
                Ok(entry) if entry.file_type().is_dir() => continue,
                Ok(entry) => WalkEntry::File(entry.into_path()),
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    WalkEntry::Error(format!("access failed for {path}: {e}"))
                }
            };
            // If the receiver is dropped, the scan was abandoned; stop walking.
            if tx.blocking_send(item).is_err() {
                break;
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|entry| (entry, rx))
    })
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Classification ignores extension case
        #[test]
        fn audio_extension_case_insensitive(
            stem in "[a-zA-Z0-9 _-]{1,20}",
            ext in prop::sample::select(AUDIO_EXTENSIONS.to_vec()),
            upper in any::<bool>(),
        ) {
            let ext = if upper { ext.to_uppercase() } else { ext.to_string() };
            let path = PathBuf::from(format!("/music/{stem}.{ext}"));
            prop_assert!(is_audio_file(&path));
        }

        /// Anything outside the allow-list is rejected
        #[test]
        fn other_extensions_rejected(
            stem in "[a-zA-Z0-9]{1,20}",
            ext in "[a-z]{1,5}",
        ) {
            prop_assume!(!AUDIO_EXTENSIONS.contains(&ext.as_str()));
            let path = PathBuf::from(format!("/music/{stem}.{ext}"));
            prop_assert!(!is_audio_file(&path));
        }
    }
}
