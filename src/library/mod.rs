//! Library synchronization: reconcile a directory tree with the catalog.
//!
//! A scan pass runs through these phases inside one database transaction:
//!
//! ```text
//! EnsureSystemAccount -> SnapshotExisting -> Walk -> Prune -> Done
//! ```
//!
//! Any phase can end in `Failed`, which drops the transaction and rolls back
//! everything the pass wrote. Per-file problems never fail the pass; they are
//! collected in [`ScanResult::errors`].
//!
//! For every new audio file the walk probes the stream, reads tags, resolves
//! the directory's cover, resolves the album, infers the genre and inserts the
//! track. Files are processed one at a time so the per-pass caches need no
//! locking.

mod service;

pub use service::{LibraryService, TriggerOutcome};

use futures::StreamExt;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::album::{AlbumRequest, AlbumResolver};
use crate::cover::{COVERS_DIR_NAME, CoverResolver};
use crate::db;
use crate::error::{Error, Result, ResultExt};
use crate::genre;
use crate::metadata::{LoftyTagReader, TagFacts, TagReader, raw_keys};
use crate::model::{NewTrack, SYSTEM_USER_ID, UNKNOWN_ARTIST, User};
use crate::probe::{AudioProber, DEFAULT_PROBE_TIMEOUT, FfprobeProber, StreamFacts};
use crate::scanner::{self, WalkEntry};

/// Everything a scan needs to know about the library on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Library root to walk
    pub root: PathBuf,
    /// Where embedded pictures are extracted to
    pub covers_dir: PathBuf,
    /// Per-file bound on the audio probe
    pub probe_timeout: Duration,
}

impl ScanConfig {
    /// Config with the covers directory under the root and the default timeout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            covers_dir: root.join(COVERS_DIR_NAME),
            root,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Every regular file visited, audio or not
    pub scanned_files: usize,
    pub added: usize,
    pub removed: usize,
    /// One line per recoverable problem
    pub errors: Vec<String>,
}

/// Phases of a scan pass, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    EnsureSystemAccount,
    SnapshotExisting,
    Walk,
    Prune,
    Done,
    Failed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EnsureSystemAccount => "ensure-system-account",
            Self::SnapshotExisting => "snapshot-existing",
            Self::Walk => "walk",
            Self::Prune => "prune",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The reconciliation orchestrator.
///
/// Holds configuration and the tag/probe capabilities; all per-pass state
/// lives inside [`scan`](Self::scan), so one scanner can be reused for many
/// passes.
pub struct LibraryScanner {
    config: ScanConfig,
    tags: Arc<dyn TagReader>,
    prober: Arc<dyn AudioProber>,
}

/// State owned by a single pass and dropped with it.
struct ScanPass {
    covers: CoverResolver,
    albums: AlbumResolver,
    found: HashSet<String>,
    result: ScanResult,
}

impl LibraryScanner {
    pub fn new(config: ScanConfig, tags: Arc<dyn TagReader>, prober: Arc<dyn AudioProber>) -> Self {
        Self {
            config,
            tags,
            prober,
        }
    }

    /// Scanner reading tags with lofty and probing with the given ffprobe binary.
    pub fn with_ffprobe(config: ScanConfig, ffprobe: impl Into<PathBuf>) -> Self {
        Self::new(
            config,
            Arc::new(LoftyTagReader),
            Arc::new(FfprobeProber::new(ffprobe)),
        )
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one full scan pass.
    ///
    /// # Errors
    ///
    /// Fails, leaving the catalog untouched, when the root is not a readable
    /// directory or when the system account, the path snapshot or the commit
    /// fails.
    pub async fn scan(&self, pool: &SqlitePool) -> Result<ScanResult> {
        let root = &self.config.root;
        info!(target: "library::scan", root = %root.display(), "Starting library scan");

        match self.run(pool).await {
            Ok(result) => {
                for err in &result.errors {
                    warn!(target: "library::scan", "{err}");
                }
                info!(
                    target: "library::scan",
                    added = result.added,
                    removed = result.removed,
                    scanned = result.scanned_files,
                    errors = result.errors.len(),
                    "scan complete"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    target: "library::scan",
                    phase = %ScanPhase::Failed,
                    root = %root.display(),
                    error = %e,
                    "Scan failed, all changes rolled back"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, pool: &SqlitePool) -> Result<ScanResult> {
        let root = canonical_root(&self.config.root).await?;

        let mut tx = pool.begin().await.with_context("starting scan transaction")?;

        debug!(target: "library::scan", phase = %ScanPhase::EnsureSystemAccount, "Checking system account");
        ensure_system_account(&mut tx)
            .await
            .with_context("ensuring system account")?;

        debug!(target: "library::scan", phase = %ScanPhase::SnapshotExisting, "Reading cataloged paths");
        let snapshot: HashSet<String> = db::track_paths(&mut tx)
            .await
            .with_context("reading cataloged paths")?
            .into_iter()
            .collect();
        debug!(target: "library::scan", existing = snapshot.len(), "Snapshot taken");

        let mut pass = ScanPass {
            covers: CoverResolver::new(&self.config.covers_dir),
            albums: AlbumResolver::new(),
            found: HashSet::new(),
            result: ScanResult::default(),
        };

        debug!(target: "library::scan", phase = %ScanPhase::Walk, "Walking library");
        let entries = scanner::walk(root);
        let mut entries = std::pin::pin!(entries);
        while let Some(entry) = entries.next().await {
            let path = match entry {
                WalkEntry::File(path) => path,
                WalkEntry::Error(err) => {
                    pass.result.errors.push(err);
                    continue;
                }
            };

            pass.result.scanned_files += 1;
            let key = path.to_string_lossy().into_owned();
            let is_new = !snapshot.contains(&key);
            pass.found.insert(key);

            if !is_new || !scanner::is_audio_file(&path) {
                continue;
            }

            match self.add_file(&mut tx, &mut pass, &path).await {
                Ok(()) => pass.result.added += 1,
                Err(err) => pass.result.errors.push(err),
            }
        }

        debug!(target: "library::scan", phase = %ScanPhase::Prune, "Pruning missing files");
        let mut orphans: Vec<&String> = snapshot.difference(&pass.found).collect();
        orphans.sort();
        for path in orphans {
            match db::delete_track_by_path(&mut tx, path).await {
                Ok(deleted) => {
                    pass.result.removed += deleted as usize;
                    debug!(target: "library::scan", path = %path, "Removed missing track");
                }
                Err(e) => pass.result.errors.push(format!("delete failed for {path}: {e}")),
            }
        }

        tx.commit().await.with_context("committing scan")?;

        debug!(
            target: "library::scan",
            phase = %ScanPhase::Done,
            cover_dirs = pass.covers.resolved_dirs(),
            covers_written = pass.covers.writes(),
            albums_created = pass.albums.created(),
            albums_backfilled = pass.albums.backfilled(),
            "Scan pass finished"
        );
        Ok(pass.result)
    }

    /// Catalog one new audio file.
    ///
    /// Returns the error line when the file ends up without a track row.
    /// Degraded-but-added files push their own error lines.
    async fn add_file(
        &self,
        conn: &mut SqliteConnection,
        pass: &mut ScanPass,
        path: &Path,
    ) -> std::result::Result<(), String> {
        let stream = self
            .prober
            .probe(path, self.config.probe_timeout)
            .await
            .map_err(|e| format!("probe failed for {}: {e}", path.display()))?;

        let facts = match self.read_tags(path).await {
            Ok(facts) => facts,
            Err(e) => {
                pass.result
                    .errors
                    .push(format!("tag read failed for {}: {e}", path.display()));
                TagFacts::default()
            }
        };

        let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);

        let dir = path.parent().unwrap_or(self.config.root.as_path());
        let cover = pass.covers.resolve(dir, facts.picture.as_ref());

        let album_id = if facts.album.is_empty() {
            None
        } else {
            let request = AlbumRequest {
                name: &facts.album,
                artist: facts.album_owner().unwrap_or(""),
                genre: &facts.genre,
                year: facts.year,
                cover: cover.as_deref(),
            };
            match pass.albums.resolve(conn, &request).await {
                Ok(id) => Some(id),
                Err(e) => {
                    pass.result
                        .errors
                        .push(format!("album create failed for {}: {e}", path.display()));
                    None
                }
            }
        };

        let genre = match genre::infer(conn, &facts.genre, album_id.as_deref(), &facts.album).await
        {
            Ok(genre) => genre,
            Err(e) => {
                pass.result
                    .errors
                    .push(format!("genre lookup failed for {}: {e}", path.display()));
                genre::infer_from_album_name(&facts.album)
                    .unwrap_or(genre::UNKNOWN_GENRE)
                    .to_string()
            }
        };

        let track = build_track(path, &facts, &stream, size, genre, cover.as_deref(), album_id);
        let id = db::insert_track(conn, &track)
            .await
            .map_err(|e| format!("insert failed for {}: {e}", path.display()))?;

        debug!(
            target: "library::scan",
            id = %id,
            path = %path.display(),
            title = %track.title,
            "Added track"
        );
        Ok(())
    }

    /// Read tags on the blocking pool.
    async fn read_tags(&self, path: &Path) -> Result<TagFacts> {
        let tags = Arc::clone(&self.tags);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || tags.read(&owned))
            .await
            .map_err(|e| Error::metadata(path, e.to_string()))?
    }
}

/// Resolve the root to an absolute directory path.
async fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = tokio::fs::canonicalize(root)
        .await
        .map_err(|_| Error::not_found(root))?;
    let meta = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| Error::not_found(root))?;
    if !meta.is_dir() {
        return Err(Error::not_found(root));
    }
    // An unreadable root walks as empty and would prune every track.
    tokio::fs::read_dir(&canonical)
        .await
        .with_context(format!("reading library root {}", root.display()))?;
    Ok(canonical)
}

async fn ensure_system_account(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    if db::find_user(conn, SYSTEM_USER_ID).await?.is_some() {
        return Ok(());
    }
    info!(target: "library::scan", id = SYSTEM_USER_ID, "Creating system account");
    db::create_user(conn, &User::system()).await
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Assemble the track row from everything learned about the file.
fn build_track(
    path: &Path,
    facts: &TagFacts,
    stream: &StreamFacts,
    size: u64,
    genre: String,
    cover: Option<&Path>,
    album_id: Option<String>,
) -> NewTrack {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let artist = non_empty_or(&facts.artist, UNKNOWN_ARTIST).to_string();

    NewTrack {
        path: path.to_string_lossy().into_owned(),
        title: non_empty_or(&facts.title, &stem).to_string(),
        album_artist: non_empty_or(&facts.album_artist, &artist).to_string(),
        artist,
        composer: facts.composer.clone(),
        performer: facts.raw(raw_keys::PERFORMER).to_string(),
        genre,
        year: facts.year,
        release_date: facts.raw(raw_keys::DATE).to_string(),
        track_number: facts.track_number,
        disc_number: facts.disc_number,
        duration: stream.duration_secs,
        size,
        suffix,
        bit_rate: stream.bit_rate_kbps,
        sample_rate: stream.sample_rate,
        bit_depth: stream.bit_depth,
        channels: stream.channels,
        has_cover_art: facts.picture.is_some(),
        cover_path: cover.map(|p| p.to_string_lossy().into_owned()),
        label: facts.raw(raw_keys::LABEL).to_string(),
        copyright: facts.raw(raw_keys::COPYRIGHT).to_string(),
        isrc: facts.raw(raw_keys::ISRC).to_string(),
        upc: facts.raw(raw_keys::UPC).to_string(),
        album_id,
        user_id: SYSTEM_USER_ID.to_string(),
    }
}
