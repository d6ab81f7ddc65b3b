//! Audio asset retrieval via yt-dlp
//!
//! Downloads the best available audio stream for an accepted candidate and
//! transcodes it to AAC in an M4A container at a fixed bitrate. The target
//! filename is derived from the track title, not the remote upload title,
//! so repeated runs land on a stable path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

/// Fixed transcode bitrate, kbps
pub const TARGET_BITRATE_KBPS: i64 = 192;

/// Longest filename stem derived from a title, in characters
const MAX_FILENAME_CHARS: usize = 120;

/// A fetched local asset plus the provider-reported metadata that came
/// with it. The file belongs to the pipeline run until it is recorded.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub path: PathBuf,
    pub remote_id: String,
    pub duration_secs: Option<f64>,
    pub approx_size_bytes: Option<i64>,
}

/// Fetch seam: the orchestrator depends on this trait so tests can swap in
/// a backend that fabricates files instead of talking to the network.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Download `url` as audio into `output_dir`, naming the file after
    /// `title`
    async fn fetch(&self, url: &str, title: &str, output_dir: &Path) -> Result<FetchedAsset>;
}

/// Info dict printed by yt-dlp after a download
#[derive(Debug, Deserialize)]
struct DownloadInfo {
    id: Option<String>,
    duration: Option<f64>,
    filesize_approx: Option<f64>,
    filesize: Option<f64>,
}

/// yt-dlp-backed fetcher
pub struct YtDlpFetcher {
    ytdlp_path: String,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(ytdlp_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AssetFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, title: &str, output_dir: &Path) -> Result<FetchedAsset> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let stem = sanitize_title(title);
        let template = output_dir.join(format!("{stem}.%(ext)s"));
        let expected = output_dir.join(format!("{stem}.m4a"));

        debug!(url = %url, target = %expected.display(), "Downloading audio via yt-dlp");

        let mut command = Command::new(&self.ytdlp_path);
        command
            .arg(url)
            .args(["-f", "bestaudio/best"])
            .arg("--no-playlist")
            .arg("--extract-audio")
            .args(["--audio-format", "m4a"])
            .args(["--audio-quality", "192K"])
            .args(["--postprocessor-args", "ffmpeg:-movflags +faststart"])
            .arg("--embed-metadata")
            .arg("--print-json")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&template)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "yt-dlp download timed out after {}s for {url}",
                    self.timeout.as_secs()
                )
            })?
            .with_context(|| format!("Failed to execute {}", self.ytdlp_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "yt-dlp download failed for {url}: {}",
                if stderr.is_empty() {
                    "no error output"
                } else {
                    stderr.trim()
                }
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info: DownloadInfo = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .map(serde_json::from_str)
            .transpose()
            .context("Failed to parse yt-dlp info JSON")?
            .unwrap_or(DownloadInfo {
                id: None,
                duration: None,
                filesize_approx: None,
                filesize: None,
            });

        if !expected.exists() {
            anyhow::bail!(
                "yt-dlp reported success but {} is missing",
                expected.display()
            );
        }

        let approx_size_bytes = info
            .filesize_approx
            .or(info.filesize)
            .map(|bytes| bytes as i64);

        info!(
            url = %url,
            path = %expected.display(),
            duration_secs = ?info.duration,
            approx_size_bytes = ?approx_size_bytes,
            "Audio fetched"
        );

        Ok(FetchedAsset {
            path: expected,
            remote_id: info.id.unwrap_or_default(),
            duration_secs: info.duration,
            approx_size_bytes,
        })
    }
}

/// Derive a filesystem-safe stem from a track title: strip characters that
/// are illegal in paths and cap runaway lengths at a character boundary
pub fn sanitize_title(title: &str) -> String {
    let cleaned = sanitize_filename::sanitize(title);
    let mut stem: String = cleaned.chars().take(MAX_FILENAME_CHARS).collect();
    stem.truncate(stem.trim_end_matches(['.', ' ']).len());
    if stem.is_empty() {
        "track".to_string()
    } else {
        stem
    }
}
