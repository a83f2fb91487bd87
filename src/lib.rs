//! Saboriman - library synchronization for a personal music catalog.
//!
//! Walks a music folder, reads tags and stream facts from new audio files,
//! groups them into albums, resolves cover art, infers missing genres and
//! prunes catalog rows whose files are gone, all in one transaction per pass.
//! Entry point: [`library::LibraryScanner`] and [`library::LibraryService`].

pub mod album;
pub mod cli;
pub mod config;
pub mod cover;
pub mod db;
pub mod error;
pub mod genre;
pub mod library;
pub mod metadata;
pub mod model;
pub mod probe;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;
