//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database path (SQLite)
    pub database_path: String,

    /// Directory downloaded audio files are written into
    pub downloads_path: String,

    /// Path to the yt-dlp executable
    pub ytdlp_path: String,

    /// Path to the ffmpeg executable (silence trimming)
    pub ffmpeg_path: String,

    /// Number of concurrent pipeline workers
    pub worker_count: usize,

    /// Timeout for a single external search call, in seconds
    pub search_timeout_secs: u64,

    /// Timeout for a single download/transcode call, in seconds
    pub fetch_timeout_secs: u64,

    /// Results fetched per search query
    pub search_results: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/tunehunt.db".to_string()),

            downloads_path: env::var("DOWNLOADS_PATH")
                .unwrap_or_else(|_| "./data/downloads".to_string()),

            ytdlp_path: env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),

            worker_count: env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("Invalid WORKER_COUNT")?,

            search_timeout_secs: env::var("SEARCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid SEARCH_TIMEOUT_SECS")?,

            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid FETCH_TIMEOUT_SECS")?,

            search_results: env::var("SEARCH_RESULTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid SEARCH_RESULTS")?,
        })
    }
}
