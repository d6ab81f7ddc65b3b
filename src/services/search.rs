//! Video platform search via yt-dlp
//!
//! Uses yt-dlp's `ytsearchN:` pseudo-URL with `--flat-playlist --dump-json`,
//! which emits one JSON object per result line. Shelling out to the
//! command-line tool is more reliable than scraping: the JSON output is
//! stable and handles the platform's markup churn for us.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

/// What a search hit refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Video,
    Channel,
}

/// A single search result. Transient: evaluated during one resolution and
/// never persisted.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub kind: HitKind,
    /// Remote id of the video (empty for channel hits without one)
    pub id: String,
    pub title: String,
    pub description: String,
    pub uploader: String,
    /// Webpage reference of the video or channel
    pub url: String,
}

/// Search seam: the resolver only depends on this trait, so tests (and a
/// stricter matching strategy) can supply their own backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run one bounded search and return up to `limit` hits
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Flat-playlist entry as printed by yt-dlp
#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(rename = "_type")]
    entry_type: Option<String>,
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

/// yt-dlp-backed search
pub struct YtDlpSearch {
    ytdlp_path: String,
    timeout: Duration,
}

impl YtDlpSearch {
    pub fn new(ytdlp_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            timeout,
        }
    }

    /// Check if yt-dlp is available
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ytdlp_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl SearchBackend for YtDlpSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        debug!(query = %query, limit = limit, "Searching via yt-dlp");

        let mut command = Command::new(&self.ytdlp_path);
        command
            .arg(format!("ytsearch{limit}:{query}"))
            .args(["--flat-playlist", "--dump-json", "--no-warnings", "--quiet"])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "yt-dlp search timed out after {}s for '{query}'",
                    self.timeout.as_secs()
                )
            })?
            .with_context(|| format!("Failed to execute {}", self.ytdlp_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "yt-dlp search failed for '{query}': {}",
                if stderr.is_empty() {
                    "no error output"
                } else {
                    stderr.trim()
                }
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut hits = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: FlatEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable search result line");
                    continue;
                }
            };
            if let Some(hit) = convert_entry(entry) {
                hits.push(hit);
            }
        }

        debug!(query = %query, hits = hits.len(), "Search complete");
        Ok(hits)
    }
}

/// Convert a flat-playlist entry into a hit, dropping entries without a
/// usable webpage reference
fn convert_entry(entry: FlatEntry) -> Option<SearchHit> {
    let url = entry.webpage_url.or(entry.url).filter(|u| !u.is_empty())?;

    // Channel results come back as `_type: url` entries whose target is a
    // channel page rather than a watch page
    let is_channel = entry.entry_type.as_deref() == Some("url") && url.contains("channel");

    Some(SearchHit {
        kind: if is_channel {
            HitKind::Channel
        } else {
            HitKind::Video
        },
        id: entry.id.unwrap_or_default(),
        title: entry.title.unwrap_or_default(),
        description: entry.description.unwrap_or_default(),
        uploader: entry.uploader.unwrap_or_default(),
        url,
    })
}
