//! tunehunt entry point
//!
//! Reads a JSON track export, then runs the resolve/fetch/trim/tag/record
//! pipeline over it with bounded concurrency.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tunehunt::cli::{CliOptions, USAGE};
use tunehunt::config::Config;
use tunehunt::db::Database;
use tunehunt::services::{
    BatchOrchestrator, CandidateResolver, ResolverConfig, SilenceTrimmer, YtDlpFetcher,
    YtDlpSearch,
};
use tunehunt::track::TrackDescriptor;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tunehunt=info")),
        )
        .init();

    let options = CliOptions::from_args();
    if options.help {
        print!("{USAGE}");
        return Ok(());
    }
    let Some(tracks_path) = options.tracks_path else {
        print!("{USAGE}");
        anyhow::bail!("No track export given");
    };

    let config = Config::from_env()?;
    let tracks = read_track_export(&tracks_path)?;
    info!(count = tracks.len(), path = %tracks_path.display(), "Loaded track export");

    let db = Database::connect(&config.database_path).await?;
    let username = options.username.as_deref().unwrap_or("default");
    let user_id = db.users().get_or_create(username).await?;

    let search = Arc::new(YtDlpSearch::new(
        &config.ytdlp_path,
        Duration::from_secs(config.search_timeout_secs),
    ));
    if !search.is_available().await {
        warn!(path = %config.ytdlp_path, "yt-dlp not found or not runnable");
    }

    let resolver = CandidateResolver::new(
        search,
        db.clone(),
        ResolverConfig {
            search_results: config.search_results,
            ..ResolverConfig::default()
        },
    );
    let fetcher = Arc::new(YtDlpFetcher::new(
        &config.ytdlp_path,
        Duration::from_secs(config.fetch_timeout_secs),
    ));
    let trimmer = SilenceTrimmer::new(&config.ffmpeg_path);

    let output_dir = options
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&config.downloads_path));
    let worker_count = options.worker_count.unwrap_or(config.worker_count);

    let orchestrator = BatchOrchestrator::new(
        db,
        resolver,
        fetcher,
        trimmer,
        output_dir,
        worker_count,
    );
    let report = orchestrator.run_batch(user_id, tracks).await;

    println!(
        "Processed {} tracks: {} succeeded, {} failed",
        report.total(),
        report.succeeded,
        report.failed.len()
    );
    for failure in &report.failed {
        println!("  {} - {}", failure.track.display(), failure.reason);
    }

    if report.succeeded == 0 && !report.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_track_export(path: &std::path::Path) -> Result<Vec<TrackDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read track export {}", path.display()))?;
    let tracks: Vec<TrackDescriptor> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid track export {}", path.display()))?;
    Ok(tracks)
}
