//! Background scan triggering with a single-flight guard per library root.

use parking_lot::Mutex;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use super::{LibraryScanner, ScanResult};
use crate::error::{Error, Result};

/// Result of asking for a scan.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The scan was spawned; the handle may be awaited or dropped
    Started(JoinHandle<Result<ScanResult>>),
    /// A scan of the same root is still running; nothing was started
    AlreadyRunning,
}

/// Owns the catalog pool and a scanner and runs passes on request.
///
/// Clones share the same in-flight set, so at most one pass per root runs
/// across all of them.
#[derive(Clone)]
pub struct LibraryService {
    pool: SqlitePool,
    scanner: Arc<LibraryScanner>,
    running: Arc<Mutex<HashSet<PathBuf>>>,
}

/// Marks a root as busy until dropped.
struct ScanGuard {
    root: PathBuf,
    running: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.root);
    }
}

impl LibraryService {
    pub fn new(pool: SqlitePool, scanner: LibraryScanner) -> Self {
        Self {
            pool,
            scanner: Arc::new(scanner),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether a pass over this service's root is in flight.
    pub fn is_running(&self) -> bool {
        self.running.lock().contains(&self.scanner.config().root)
    }

    fn try_acquire(&self) -> Option<ScanGuard> {
        let root = self.scanner.config().root.clone();
        let mut running = self.running.lock();
        if !running.insert(root.clone()) {
            return None;
        }
        Some(ScanGuard {
            root,
            running: Arc::clone(&self.running),
        })
    }

    /// Start a scan in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.try_acquire() else {
            info!(
                target: "library::service",
                root = %self.scanner.config().root.display(),
                "Scan already running, trigger ignored"
            );
            return TriggerOutcome::AlreadyRunning;
        };

        let pool = self.pool.clone();
        let scanner = Arc::clone(&self.scanner);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            scanner.scan(&pool).await
        });
        TriggerOutcome::Started(handle)
    }

    /// Run a scan on the current task and wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInProgress`] when a pass over the same root is
    /// already running, otherwise whatever the pass fails with.
    pub async fn scan_now(&self) -> Result<ScanResult> {
        let _guard = self
            .try_acquire()
            .ok_or_else(|| Error::ScanInProgress(self.scanner.config().root.clone()))?;
        self.scanner.scan(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ScanConfig;
    use crate::test_utils::{FakeProber, FakeTagReader, temp_db, touch};
    use std::time::Duration;

    fn service(pool: SqlitePool, root: PathBuf, prober: FakeProber) -> LibraryService {
        let scanner = LibraryScanner::new(
            ScanConfig::new(root),
            Arc::new(FakeTagReader::new()),
            Arc::new(prober),
        );
        LibraryService::new(pool, scanner)
    }

    #[tokio::test]
    async fn test_second_trigger_is_rejected_while_running() {
        let (pool, _db) = temp_db().await;
        let library = tempfile::tempdir().unwrap();
        touch(library.path(), "A/1.flac");
        let service = service(
            pool,
            library.path().to_path_buf(),
            FakeProber::new().with_delay(Duration::from_millis(50)),
        );

        let TriggerOutcome::Started(handle) = service.trigger() else {
            panic!("first trigger should start a scan");
        };
        assert!(service.is_running());
        assert!(matches!(service.clone().trigger(), TriggerOutcome::AlreadyRunning));
        assert!(matches!(
            service.scan_now().await,
            Err(Error::ScanInProgress(_))
        ));

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.added, 1);
        assert!(!service.is_running());

        // Guard released, the next trigger starts a fresh pass
        let TriggerOutcome::Started(handle) = service.trigger() else {
            panic!("guard should be released after the scan");
        };
        assert_eq!(handle.await.unwrap().unwrap().added, 0);
    }

    #[tokio::test]
    async fn test_guard_released_after_failed_scan() {
        let (pool, _db) = temp_db().await;
        let library = tempfile::tempdir().unwrap();
        let service = service(pool, library.path().join("missing"), FakeProber::new());

        assert!(matches!(service.scan_now().await, Err(Error::NotFound(_))));
        assert!(!service.is_running());

        let TriggerOutcome::Started(handle) = service.trigger() else {
            panic!("guard should be released after a failed scan");
        };
        assert!(handle.await.unwrap().is_err());
        assert!(!service.is_running());
    }
}
