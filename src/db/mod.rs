//! Database module for catalog persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Account bootstrap (the reserved system account)
//! - Album lookup, creation and cover backfill
//! - Track insertion, path snapshots and pruning
//! - Read-side queries for the CLI and other collaborators
//!
//! Scan-time operations take a `&mut SqliteConnection` so they can run inside
//! the scan transaction (`&mut *tx`). Read-side helpers take the pool.
//!
//! # Example
//!
//! ```ignore
//! use saboriman::db::{init_db, get_all_tracks};
//!
//! let pool = init_db("sqlite:saboriman.db").await?;
//! let tracks = get_all_tracks(&pool).await?;
//! ```

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};

use crate::model::{Album, NewAlbum, NewTrack, Track, User, short_id};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "saboriman.db";

const TRACK_COLUMNS: &str = r#"
    id, path, title, artist, album_artist, composer, performer, genre, year,
    release_date, track_number, disc_number, duration, size, suffix, bit_rate,
    sample_rate, bit_depth, channels, has_cover_art, cover_path, label,
    copyright, isrc, upc, play_count, like_count, album_id, user_id,
    created_at, updated_at
"#;

const ALBUM_COLUMNS: &str =
    "id, name, artist_name, cover_path, release_date, genre, created_at, updated_at";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Accounts
// ============================================================================

/// Look up an account by id.
pub async fn find_user(conn: &mut SqliteConnection, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, role, status, created_at, updated_at \
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Insert an account row as given (the id is not regenerated).
pub async fn create_user(conn: &mut SqliteConnection, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(user.status)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ============================================================================
// Albums
// ============================================================================

/// Find an album by its unique `(name, artist_name)` key.
pub async fn find_album_by_key(
    conn: &mut SqliteConnection,
    name: &str,
    artist_name: &str,
) -> sqlx::Result<Option<Album>> {
    sqlx::query_as::<_, Album>(&format!(
        "SELECT {ALBUM_COLUMNS} FROM albums WHERE name = ? AND artist_name = ?"
    ))
    .bind(name)
    .bind(artist_name)
    .fetch_optional(&mut *conn)
    .await
}

/// Create an album and return the stored row.
///
/// The release date is derived from the year (January 1st) when the year is known.
pub async fn create_album(conn: &mut SqliteConnection, album: &NewAlbum) -> sqlx::Result<Album> {
    let ts = now();
    let row = Album {
        id: short_id(),
        name: album.name.clone(),
        artist_name: album.artist_name.clone(),
        cover_path: album.cover_path.clone().filter(|p| !p.is_empty()),
        release_date: album.release_date(),
        genre: album.genre.clone(),
        created_at: ts.clone(),
        updated_at: ts,
    };

    sqlx::query(&format!(
        "INSERT INTO albums ({ALBUM_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&row.id)
    .bind(&row.name)
    .bind(&row.artist_name)
    .bind(&row.cover_path)
    .bind(&row.release_date)
    .bind(&row.genre)
    .bind(&row.created_at)
    .bind(&row.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(row)
}

/// Set the cover path of an album.
pub async fn set_album_cover(
    conn: &mut SqliteConnection,
    album_id: &str,
    cover_path: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE albums SET cover_path = ?, updated_at = ? WHERE id = ?")
        .bind(cover_path)
        .bind(now())
        .bind(album_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Most frequent non-empty genre among the tracks of an album.
///
/// Ties are broken by genre name so the answer is stable across runs.
pub async fn majority_album_genre(
    conn: &mut SqliteConnection,
    album_id: &str,
) -> sqlx::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT genre FROM tracks
        WHERE album_id = ? AND genre != ''
        GROUP BY genre
        ORDER BY COUNT(*) DESC, genre ASC
        LIMIT 1
        "#,
    )
    .bind(album_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(genre,)| genre))
}

// ============================================================================
// Tracks
// ============================================================================

/// Every cataloged track path.
pub async fn track_paths(conn: &mut SqliteConnection) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT path FROM tracks")
        .fetch_all(&mut *conn)
        .await
}

/// Insert a track and return its generated id.
///
/// Fails with a unique-constraint error if the path is already cataloged.
pub async fn insert_track(conn: &mut SqliteConnection, track: &NewTrack) -> sqlx::Result<String> {
    let id = short_id();
    let ts = now();

    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, path, title, artist, album_artist, composer, performer, genre, year,
            release_date, track_number, disc_number, duration, size, suffix, bit_rate,
            sample_rate, bit_depth, channels, has_cover_art, cover_path, label,
            copyright, isrc, upc, album_id, user_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&track.path)
    .bind(&track.title)
    .bind(&track.artist)
    .bind(&track.album_artist)
    .bind(&track.composer)
    .bind(&track.performer)
    .bind(&track.genre)
    .bind(i64::from(track.year))
    .bind(&track.release_date)
    .bind(i64::from(track.track_number))
    .bind(i64::from(track.disc_number))
    .bind(track.duration as i64)
    .bind(track.size as i64)
    .bind(&track.suffix)
    .bind(i64::from(track.bit_rate))
    .bind(i64::from(track.sample_rate))
    .bind(i64::from(track.bit_depth))
    .bind(i64::from(track.channels))
    .bind(track.has_cover_art)
    .bind(&track.cover_path)
    .bind(&track.label)
    .bind(&track.copyright)
    .bind(&track.isrc)
    .bind(&track.upc)
    .bind(&track.album_id)
    .bind(&track.user_id)
    .bind(&ts)
    .bind(&ts)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Delete the track cataloged at `path`. Returns the number of rows removed.
pub async fn delete_track_by_path(conn: &mut SqliteConnection, path: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM tracks WHERE path = ?")
        .bind(path)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Read-side queries
// ============================================================================

/// Get all tracks, ordered by path.
pub async fn get_all_tracks(pool: &SqlitePool) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY path"))
        .fetch_all(pool)
        .await
}

/// Get the track cataloged at `path`.
pub async fn get_track_by_path(pool: &SqlitePool, path: &str) -> sqlx::Result<Option<Track>> {
    sqlx::query_as::<_, Track>(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE path = ?"))
        .bind(path)
        .fetch_optional(pool)
        .await
}

/// Get all tracks belonging to an album, in disc/track order.
pub async fn get_tracks_by_album(pool: &SqlitePool, album_id: &str) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE album_id = ? \
         ORDER BY disc_number, track_number, path"
    ))
    .bind(album_id)
    .fetch_all(pool)
    .await
}

/// Get all albums, ordered by artist then name.
pub async fn get_all_albums(pool: &SqlitePool) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>(&format!(
        "SELECT {ALBUM_COLUMNS} FROM albums ORDER BY artist_name, name"
    ))
    .fetch_all(pool)
    .await
}

/// Get an album by id.
pub async fn get_album_by_id(pool: &SqlitePool, album_id: &str) -> sqlx::Result<Option<Album>> {
    sqlx::query_as::<_, Album>(&format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ?"))
        .bind(album_id)
        .fetch_optional(pool)
        .await
}

/// Album with its number of cataloged tracks.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlbumSummary {
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub cover_path: Option<String>,
    pub genre: String,
    pub track_count: i64,
}

/// Get every album with its track count. Used for listings.
pub async fn get_album_summaries(pool: &SqlitePool) -> sqlx::Result<Vec<AlbumSummary>> {
    sqlx::query_as::<_, AlbumSummary>(
        r#"
        SELECT a.id, a.name, a.artist_name, a.cover_path, a.genre,
               COUNT(t.id) AS track_count
        FROM albums a
        LEFT JOIN tracks t ON t.album_id = a.id
        GROUP BY a.id
        ORDER BY a.artist_name, a.name
        "#,
    )
    .fetch_all(pool)
    .await
}
