//! Genre inference for tracks with an empty genre tag.
//!
//! Fallback chain, first non-empty answer wins:
//!
//! 1. The track's own genre tag
//! 2. The most common genre among tracks already in the same album
//! 3. A keyword found in the album name ([`KEYWORD_GENRES`])
//! 4. [`UNKNOWN_GENRE`]

use sqlx::SqliteConnection;

use crate::db;

/// Genre assigned when nothing else matches.
pub const UNKNOWN_GENRE: &str = "Unknown";

/// Album-name keywords per canonical genre.
///
/// Checked in declaration order; the first genre with a matching keyword wins.
/// Keywords are lowercase and matched as substrings of the lowercased name.
pub const KEYWORD_GENRES: &[(&str, &[&str])] = &[
    ("Classical", &["classical", "symphony", "concerto", "sonata", "古典"]),
    ("Pop", &["pop", "流行"]),
    ("Rock", &["rock", "摇滚"]),
    ("Jazz", &["jazz", "爵士"]),
    ("Electronic", &["electronic", "edm", "techno", "house", "电子"]),
    ("Hip Hop", &["hip hop", "rap", "说唱"]),
    ("Country", &["country", "乡村"]),
    ("R&B", &["r&b", "soul"]),
    ("Metal", &["metal", "金属"]),
    ("Folk", &["folk", "民谣"]),
    ("Soundtrack", &["soundtrack", "ost", "原声"]),
    ("Anime", &["anime", "动漫", "アニメ"]),
    ("Game", &["game", "游戏", "ゲーム"]),
];

/// Match the album name against [`KEYWORD_GENRES`].
pub fn infer_from_album_name(album_name: &str) -> Option<&'static str> {
    if album_name.is_empty() {
        return None;
    }
    let name = album_name.to_lowercase();
    KEYWORD_GENRES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(genre, _)| *genre)
}

/// Resolve a track's genre.
///
/// `album_id` is the album the track is about to join, if any. The majority
/// vote only sees tracks already written in this transaction or earlier.
///
/// # Errors
///
/// Returns the database error from the album majority query.
pub async fn infer(
    conn: &mut SqliteConnection,
    explicit: &str,
    album_id: Option<&str>,
    album_name: &str,
) -> sqlx::Result<String> {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }

    if let Some(album_id) = album_id.filter(|id| !id.is_empty())
        && let Some(genre) = db::majority_album_genre(conn, album_id).await?
    {
        tracing::trace!(target: "genre::infer", album_id, %genre, "Genre from album majority");
        return Ok(genre);
    }

    if let Some(genre) = infer_from_album_name(album_name) {
        tracing::trace!(target: "genre::infer", album = album_name, genre, "Genre from album name");
        return Ok(genre.to_string());
    }

    Ok(UNKNOWN_GENRE.to_string())
}
