//! Album resolution for a scan pass.
//!
//! Maps an `(album name, album artist)` pair to a catalog album id. Lookups go
//! to a per-scan memory cache first, then to the database; an album seen for
//! the first time is created. An existing album without artwork gets the
//! current file's cover backfilled.

use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::path::Path;

use crate::db;
use crate::model::{Album, NewAlbum, UNKNOWN_ARTIST};

/// What the scan knows about a file's album.
#[derive(Debug, Clone, Copy)]
pub struct AlbumRequest<'a> {
    pub name: &'a str,
    /// Album-artist or artist tag; empty falls back to [`UNKNOWN_ARTIST`]
    pub artist: &'a str,
    /// Used only when the album is created
    pub genre: &'a str,
    /// Used only when the album is created; 0 means unknown
    pub year: u32,
    /// The cover resolved for the file's directory
    pub cover: Option<&'a Path>,
}

impl AlbumRequest<'_> {
    fn artist_or_unknown(&self) -> &str {
        if self.artist.is_empty() {
            UNKNOWN_ARTIST
        } else {
            self.artist
        }
    }
}

/// Per-scan album cache.
#[derive(Debug, Default)]
pub struct AlbumResolver {
    cache: HashMap<String, Album>,
    created: usize,
    backfilled: usize,
}

impl AlbumResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the album id for a file, creating the album if needed.
    ///
    /// # Errors
    ///
    /// Returns the database error if the album cannot be looked up or created.
    /// The caller records it and keeps the track without an album.
    pub async fn resolve(
        &mut self,
        conn: &mut SqliteConnection,
        request: &AlbumRequest<'_>,
    ) -> sqlx::Result<String> {
        let artist = request.artist_or_unknown();
        let key = Album::key(request.name, artist);
        let cover = request
            .cover
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty());

        let mut album = match self.cache.remove(&key) {
            Some(cached) => cached,
            None => match db::find_album_by_key(conn, request.name, artist).await? {
                Some(existing) => existing,
                None => {
                    let created = db::create_album(
                        conn,
                        &NewAlbum {
                            name: request.name.to_string(),
                            artist_name: artist.to_string(),
                            genre: request.genre.to_string(),
                            year: request.year,
                            cover_path: cover.clone(),
                        },
                    )
                    .await?;
                    self.created += 1;
                    tracing::debug!(
                        target: "album::resolve",
                        id = %created.id,
                        album = %created.name,
                        artist = %created.artist_name,
                        "Created album"
                    );
                    created
                }
            },
        };

        if !album.has_cover()
            && let Some(cover) = cover
        {
            match db::set_album_cover(conn, &album.id, &cover).await {
                Ok(()) => {
                    album.cover_path = Some(cover);
                    self.backfilled += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "album::resolve",
                        id = %album.id,
                        error = %e,
                        "Failed to backfill album cover"
                    );
                }
            }
        }

        let id = album.id.clone();
        self.cache.insert(key, album);
        Ok(id)
    }

    /// Albums created during this pass.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Existing albums that received a cover during this pass.
    pub fn backfilled(&self) -> usize {
        self.backfilled
    }
}
