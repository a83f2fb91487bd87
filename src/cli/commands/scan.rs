//! Library scanning and catalog listing commands.

use anyhow::Context;
use std::collections::HashMap;
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::db;
use crate::library::{LibraryScanner, LibraryService, ScanResult, TriggerOutcome};

async fn open_catalog(config: &Config) -> anyhow::Result<sqlx::SqlitePool> {
    db::init_db(&config.db_url())
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))
}

/// Scan the music folder and reconcile the catalog
pub fn cmd_scan(rt: &Runtime, config: &Config, json: bool) -> anyhow::Result<()> {
    let scan_config = config.scan_config()?;
    let root = scan_config.root.clone();

    let result = rt.block_on(async {
        let pool = open_catalog(config).await?;
        let scanner = LibraryScanner::with_ffprobe(scan_config, config.scan.ffprobe_path.clone());
        let service = LibraryService::new(pool, scanner);

        if !json {
            println!("Scanning directory: {}", root.display());
        }
        let TriggerOutcome::Started(handle) = service.trigger() else {
            anyhow::bail!("A scan of {} is already running", root.display());
        };
        let result = handle.await.context("Scan task panicked")??;
        anyhow::Ok(result)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &ScanResult) {
    println!(
        "Scan complete: {} files scanned, {} added, {} removed, {} errors",
        result.scanned_files,
        result.added,
        result.removed,
        result.errors.len()
    );
    for err in &result.errors {
        eprintln!("  {}", err);
    }
}

/// List all tracks in the database
pub fn cmd_list(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalog(config).await?;
        let tracks = db::get_all_tracks(&pool).await.context("Failed to get tracks")?;
        let albums: HashMap<String, String> = db::get_all_albums(&pool)
            .await
            .context("Failed to get albums")?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();

        for track in &tracks {
            let album = track
                .album_id
                .as_ref()
                .and_then(|id| albums.get(id))
                .map(String::as_str)
                .unwrap_or("-");
            println!("{} - {} [{}] {}", track.artist, track.title, album, track.path);
        }
        println!("{} tracks", tracks.len());
        Ok(())
    })
}

/// List all albums with track counts and covers
pub fn cmd_albums(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalog(config).await?;
        let albums = db::get_album_summaries(&pool)
            .await
            .context("Failed to get albums")?;

        for album in &albums {
            let genre = if album.genre.is_empty() { "-" } else { album.genre.as_str() };
            println!(
                "{} - {} ({} tracks, {}) cover: {}",
                album.artist_name,
                album.name,
                album.track_count,
                genre,
                album.cover_path.as_deref().unwrap_or("-")
            );
        }
        println!("{} albums", albums.len());
        Ok(())
    })
}
