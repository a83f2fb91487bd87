//! Test utilities and fixtures for saboriman tests.
//!
//! This module provides a temporary database, fake tag/probe capabilities and
//! fixture tree helpers so scan tests never need real audio files or ffprobe.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_db, FakeTagReader, FakeProber};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let tags = FakeTagReader::new();
//!     let prober = FakeProber::new();
//!     // ... test logic
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::metadata::{EmbeddedPicture, TagFacts, TagReader};
use crate::model::{NewTrack, SYSTEM_USER_ID};
use crate::probe::{AudioProber, ProbeError, StreamFacts};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// A minimal track payload owned by the system account.
///
/// Customize with struct update syntax:
///
/// ```ignore
/// let track = NewTrack { genre: "Jazz".to_string(), ..new_track("/m/a.flac") };
/// ```
pub fn new_track(path: &str) -> NewTrack {
    NewTrack {
        path: path.to_string(),
        title: "Test Track".to_string(),
        artist: "Test Artist".to_string(),
        album_artist: "Test Artist".to_string(),
        duration: 180,
        suffix: "flac".to_string(),
        user_id: SYSTEM_USER_ID.to_string(),
        ..Default::default()
    }
}

/// Tag facts for an album track.
pub fn album_facts(album: &str, artist: &str) -> TagFacts {
    TagFacts {
        artist: artist.to_string(),
        album: album.to_string(),
        ..Default::default()
    }
}

/// An embedded JPEG picture with the given bytes.
pub fn picture(data: &[u8]) -> EmbeddedPicture {
    EmbeddedPicture {
        data: data.to_vec(),
        ext: "jpg".to_string(),
    }
}

/// Create a file (and its parent directories) with placeholder content.
pub fn touch(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture dir");
    }
    std::fs::write(&path, b"fixture").expect("Failed to write fixture file");
    path
}

/// [`TagReader`] answering from a path-keyed table.
///
/// Unknown paths read as empty tags; paths marked with
/// [`fail`](Self::fail) return a metadata error.
#[derive(Default)]
pub struct FakeTagReader {
    facts: Mutex<HashMap<PathBuf, TagFacts>>,
    failing: Mutex<HashSet<PathBuf>>,
    reads: Mutex<Vec<PathBuf>>,
}

impl FakeTagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<PathBuf>, facts: TagFacts) {
        self.facts.lock().insert(path.into(), facts);
    }

    pub fn fail(&self, path: impl Into<PathBuf>) {
        self.failing.lock().insert(path.into());
    }

    /// Paths read so far, in order.
    pub fn reads(&self) -> Vec<PathBuf> {
        self.reads.lock().clone()
    }
}

impl TagReader for FakeTagReader {
    fn read(&self, path: &Path) -> Result<TagFacts> {
        self.reads.lock().push(path.to_path_buf());
        if self.failing.lock().contains(path) {
            return Err(Error::metadata(path, "unsupported tag format"));
        }
        Ok(self.facts.lock().get(path).cloned().unwrap_or_default())
    }
}

/// [`AudioProber`] answering from a path-keyed table.
///
/// Unknown paths get the default facts; paths marked with
/// [`fail`](Self::fail) return [`ProbeError::NoAudioStream`].
pub struct FakeProber {
    default: StreamFacts,
    facts: Mutex<HashMap<PathBuf, StreamFacts>>,
    failing: Mutex<HashSet<PathBuf>>,
    delay: Option<Duration>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::with_default(StreamFacts {
            duration_secs: 180,
            bit_rate_kbps: 320,
            sample_rate: 44100,
            bit_depth: 16,
            channels: 2,
        })
    }

    pub fn with_default(default: StreamFacts) -> Self {
        Self {
            default,
            facts: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            delay: None,
        }
    }

    /// Sleep before answering, to keep a scan in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, path: impl Into<PathBuf>, facts: StreamFacts) {
        self.facts.lock().insert(path.into(), facts);
    }

    pub fn fail(&self, path: impl Into<PathBuf>) {
        self.failing.lock().insert(path.into());
    }
}

impl Default for FakeProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioProber for FakeProber {
    async fn probe(&self, path: &Path, deadline: Duration) -> std::result::Result<StreamFacts, ProbeError> {
        if let Some(delay) = self.delay {
            if delay > deadline {
                tokio::time::sleep(deadline).await;
                return Err(ProbeError::Timeout(deadline));
            }
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(path) {
            return Err(ProbeError::NoAudioStream);
        }
        Ok(self.facts.lock().get(path).copied().unwrap_or(self.default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let tracks = crate::db::get_all_tracks(&pool).await.unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_touch_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "A/B/song.flac");
        assert!(path.is_file());
    }

    #[test]
    fn test_fake_tag_reader() {
        let tags = FakeTagReader::new();
        tags.set("/m/a.flac", album_facts("Demo", "X"));
        tags.fail("/m/bad.flac");

        assert_eq!(tags.read(Path::new("/m/a.flac")).unwrap().album, "Demo");
        assert_eq!(tags.read(Path::new("/m/other.flac")).unwrap(), TagFacts::default());
        assert!(tags.read(Path::new("/m/bad.flac")).is_err());
        assert_eq!(tags.reads().len(), 3);
    }

    #[tokio::test]
    async fn test_fake_prober() {
        let prober = FakeProber::new();
        prober.fail("/m/bad.flac");
        let deadline = Duration::from_secs(1);

        let facts = prober.probe(Path::new("/m/a.flac"), deadline).await.unwrap();
        assert_eq!(facts.bit_rate_kbps, 320);
        assert!(prober.probe(Path::new("/m/bad.flac"), deadline).await.is_err());
    }
}
