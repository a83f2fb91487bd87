//! Core data models for the catalog.
//!
//! Defines the persisted entities: [`Track`], [`Album`] and [`User`], plus the
//! insert payloads the scan builds ([`NewTrack`], [`NewAlbum`]).
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `users` - Catalog accounts, including the reserved system account
//! - `albums` - Albums keyed by `(name, artist_name)`
//! - `tracks` - Individual audio files keyed by absolute path

use sqlx::FromRow;

/// Id of the reserved account that owns scan-created tracks.
pub const SYSTEM_USER_ID: &str = "SYSTEM";

/// Artist name used when a file carries neither an artist nor an album-artist tag.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Generate a short opaque id: the first 8 hex digits of a random UUID, uppercased.
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id.to_ascii_uppercase()
}

/// A catalog account.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// `!` marks an account that cannot log in.
    pub password_hash: String,
    /// `admin` or `user`
    pub role: String,
    /// 1 = active, 0 = disabled
    pub status: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// The reserved account that owns every scan-created track.
    pub fn system() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: SYSTEM_USER_ID.to_string(),
            username: "System".to_string(),
            email: "system@localhost".to_string(),
            password_hash: "!".to_string(),
            role: "admin".to_string(),
            status: 1,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// An album in the catalog.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Album {
    /// Short opaque id
    pub id: String,
    /// Album title
    pub name: String,
    /// Album artist (unique together with `name`)
    pub artist_name: String,
    /// Resolved cover image on disk
    pub cover_path: Option<String>,
    /// ISO date; year-only precision is stored as January 1st
    pub release_date: Option<String>,
    /// Genre from the tag of the first track seen (may be empty)
    pub genre: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Album {
    /// Cache key for the album resolver: `name::artist`.
    pub fn key(name: &str, artist: &str) -> String {
        format!("{name}::{artist}")
    }

    pub fn has_cover(&self) -> bool {
        self.cover_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Payload for creating an album.
#[derive(Debug, Clone, Default)]
pub struct NewAlbum {
    pub name: String,
    pub artist_name: String,
    pub genre: String,
    /// Tag year; 0 means unknown
    pub year: u32,
    pub cover_path: Option<String>,
}

impl NewAlbum {
    /// Release date derived from the year: January 1st, or `None` when unknown.
    pub fn release_date(&self) -> Option<String> {
        if self.year == 0 {
            return None;
        }
        chrono::NaiveDate::from_ymd_opt(self.year as i32, 1, 1)
            .map(|d| d.format("%Y-%m-%d").to_string())
    }
}

/// A track (audio file) in the catalog.
#[derive(Debug, Clone, FromRow)]
pub struct Track {
    pub id: String,
    /// Absolute file path (unique)
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album_artist: String,
    pub composer: String,
    pub performer: String,
    pub genre: String,
    pub year: i64,
    /// Free-text release date from the raw `date` tag
    pub release_date: String,
    pub track_number: i64,
    pub disc_number: i64,
    /// Whole seconds
    pub duration: i64,
    /// Bytes
    pub size: i64,
    pub suffix: String,
    /// kbps
    pub bit_rate: i64,
    /// Hz
    pub sample_rate: i64,
    pub bit_depth: i64,
    pub channels: i64,
    pub has_cover_art: bool,
    pub cover_path: Option<String>,
    pub label: String,
    pub copyright: String,
    pub isrc: String,
    pub upc: String,
    pub play_count: i64,
    pub like_count: i64,
    pub album_id: Option<String>,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for inserting a track. Counters start at zero.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album_artist: String,
    pub composer: String,
    pub performer: String,
    pub genre: String,
    pub year: u32,
    pub release_date: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub duration: u64,
    pub size: u64,
    pub suffix: String,
    pub bit_rate: u32,
    pub sample_rate: u32,
    pub bit_depth: u32,
    pub channels: u32,
    pub has_cover_art: bool,
    pub cover_path: Option<String>,
    pub label: String,
    pub copyright: String,
    pub isrc: String,
    pub upc: String,
    pub album_id: Option<String>,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_shape() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(short_id(), short_id());
    }

    #[test]
    fn test_album_key() {
        assert_eq!(Album::key("Demo", "X"), "Demo::X");
    }

    #[test]
    fn test_release_date_from_year() {
        let album = NewAlbum {
            year: 1997,
            ..Default::default()
        };
        assert_eq!(album.release_date().as_deref(), Some("1997-01-01"));

        let unknown = NewAlbum::default();
        assert_eq!(unknown.release_date(), None);
    }

    #[test]
    fn test_system_user() {
        let user = User::system();
        assert_eq!(user.id, SYSTEM_USER_ID);
        assert!(user.is_admin());
        assert_eq!(user.status, 1);
    }
}
