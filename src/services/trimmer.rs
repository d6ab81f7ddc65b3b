//! Leading/trailing silence removal
//!
//! Two ffmpeg passes: `volumedetect` establishes the clip's mean loudness,
//! then `silencedetect` at mean minus 40 dB locates quiet regions. Only a
//! leading region anchored at the start and a trailing region running to
//! the end are trimmed; mid-track quiet passages are left alone. The
//! re-encode lands in a sibling temp file that replaces the original via
//! rename, so a failure at any point leaves the file untouched.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

/// Silence floor relative to mean loudness, dB
const SILENCE_FLOOR_DB: f64 = 40.0;

/// Minimum silence run considered at all, seconds
const MIN_SILENCE_SECS: f64 = 0.5;

/// Shortest clip worth keeping after a trim, seconds. Guards against
/// near-total truncation when detection misfires.
const MIN_KEPT_SECS: f64 = 0.5;

/// Smallest amount of audio worth re-encoding to remove, seconds
const MIN_TRIMMED_SECS: f64 = 0.25;

static MEAN_VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"mean_volume:\s*(-?[\d.]+)\s*dB").unwrap());
static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration:\s*(\d+):(\d+):([\d.]+)").unwrap());
static SILENCE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"silence_start:\s*(-?[\d.]+)").unwrap());
static SILENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"silence_end:\s*(-?[\d.]+)").unwrap());

/// One detected silence run. An open end means the run lasted to EOF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SilenceRun {
    start: f64,
    end: Option<f64>,
}

pub struct SilenceTrimmer {
    ffmpeg_path: String,
}

impl SilenceTrimmer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Trim leading/trailing silence in place. Best-effort: any failure is
    /// logged and the original file is returned unchanged.
    pub async fn trim(&self, path: &Path) -> PathBuf {
        match self.try_trim(path).await {
            Ok(true) => debug!(path = %path.display(), "Trimmed silence"),
            Ok(false) => debug!(path = %path.display(), "No silence worth trimming"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Silence trim failed, keeping original");
            }
        }
        path.to_path_buf()
    }

    async fn try_trim(&self, path: &Path) -> Result<bool> {
        let analysis = self.run_filter(path, "volumedetect").await?;
        let mean_db = parse_mean_volume(&analysis)
            .context("ffmpeg output carried no mean_volume")?;
        let duration = parse_duration_secs(&analysis)
            .context("ffmpeg output carried no duration")?;

        let floor = mean_db - SILENCE_FLOOR_DB;
        let detection = self
            .run_filter(
                path,
                &format!("silencedetect=noise={floor:.1}dB:d={MIN_SILENCE_SECS}"),
            )
            .await?;
        let runs = parse_silence_runs(&detection);

        let Some((keep_start, keep_end)) = keep_span(&runs, duration) else {
            return Ok(false);
        };

        let tmp = path.with_extension("trim.m4a");
        let result = self.encode_span(path, &tmp, keep_start, keep_end).await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        tokio::fs::rename(&tmp, path)
            .await
            .context("Failed to replace original with trimmed file")?;
        Ok(true)
    }

    /// Run ffmpeg with an analysis filter and a null muxer, returning the
    /// stderr text the filters report into
    async fn run_filter(&self, path: &Path, filter: &str) -> Result<String> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-i")
            .arg(path)
            .args(["-af", filter, "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.ffmpeg_path))?;

        if !output.status.success() {
            anyhow::bail!(
                "ffmpeg analysis failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    async fn encode_span(&self, src: &Path, dst: &Path, start: f64, end: f64) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-y")
            .arg("-i")
            .arg(src)
            .args(["-ss", &format!("{start:.3}"), "-to", &format!("{end:.3}")])
            .args(["-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"])
            .arg(dst)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.ffmpeg_path))?;

        if !output.status.success() {
            anyhow::bail!(
                "ffmpeg re-encode failed for {}: {}",
                src.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

fn parse_mean_volume(stderr: &str) -> Option<f64> {
    MEAN_VOLUME
        .captures(stderr)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
}

fn parse_duration_secs(stderr: &str) -> Option<f64> {
    let captures = DURATION.captures(stderr)?;
    let hours: f64 = captures.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = captures.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = captures.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Pair up silence_start/silence_end lines in order. A start without a
/// following end means the silence ran to the end of the clip.
fn parse_silence_runs(stderr: &str) -> Vec<SilenceRun> {
    let mut runs = Vec::new();
    for line in stderr.lines() {
        if let Some(captures) = SILENCE_START.captures(line) {
            if let Ok(start) = captures[1].parse::<f64>() {
                runs.push(SilenceRun { start, end: None });
            }
        } else if let Some(captures) = SILENCE_END.captures(line) {
            if let (Ok(end), Some(last)) = (captures[1].parse::<f64>(), runs.last_mut()) {
                if last.end.is_none() {
                    last.end = Some(end);
                }
            }
        }
    }
    runs
}

/// Decide the span worth keeping, or `None` when no trim should happen
fn keep_span(runs: &[SilenceRun], duration: f64) -> Option<(f64, f64)> {
    if runs.is_empty() || duration <= 0.0 {
        return None;
    }

    let mut keep_start = 0.0;
    if let Some(first) = runs.first() {
        // Leading silence must be anchored at (roughly) the start
        if first.start <= MIN_TRIMMED_SECS {
            keep_start = first.end.unwrap_or(duration);
        }
    }

    let mut keep_end = duration;
    if let Some(last) = runs.last() {
        let runs_to_eof = match last.end {
            None => true,
            Some(end) => end + MIN_TRIMMED_SECS >= duration,
        };
        if runs_to_eof && last.start > keep_start {
            keep_end = last.start;
        }
    }

    let kept = keep_end - keep_start;
    let trimmed = duration - kept;
    if kept < MIN_KEPT_SECS || trimmed < MIN_TRIMMED_SECS {
        return None;
    }

    Some((keep_start, keep_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUME_OUTPUT: &str = r#"
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'Yellow.m4a':
  Duration: 00:04:29.12, start: 0.000000, bitrate: 195 kb/s
[Parsed_volumedetect_0 @ 0x5591] n_samples: 23726080
[Parsed_volumedetect_0 @ 0x5591] mean_volume: -16.4 dB
[Parsed_volumedetect_0 @ 0x5591] max_volume: -0.3 dB
"#;

    #[test]
    fn test_parse_mean_volume() {
        assert_eq!(parse_mean_volume(VOLUME_OUTPUT), Some(-16.4));
        assert_eq!(parse_mean_volume("no match"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_secs(VOLUME_OUTPUT), Some(269.12));
    }

    #[test]
    fn test_parse_silence_runs() {
        let stderr = r#"
[silencedetect @ 0x1] silence_start: 0
[silencedetect @ 0x1] silence_end: 1.84 | silence_duration: 1.84
[silencedetect @ 0x1] silence_start: 266.5
"#;
        let runs = parse_silence_runs(stderr);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], SilenceRun { start: 0.0, end: Some(1.84) });
        assert_eq!(runs[1], SilenceRun { start: 266.5, end: None });
    }

    #[test]
    fn test_keep_span_trims_both_ends() {
        let runs = vec![
            SilenceRun { start: 0.0, end: Some(1.84) },
            SilenceRun { start: 266.5, end: None },
        ];
        assert_eq!(keep_span(&runs, 269.12), Some((1.84, 266.5)));
    }

    #[test]
    fn test_keep_span_ignores_mid_track_quiet() {
        // A quiet passage in the middle is not leading or trailing silence
        let runs = vec![SilenceRun { start: 120.0, end: Some(125.0) }];
        assert_eq!(keep_span(&runs, 269.12), None);
    }

    #[test]
    fn test_keep_span_no_silence() {
        assert_eq!(keep_span(&[], 269.12), None);
    }

    #[test]
    fn test_keep_span_refuses_near_total_truncation() {
        // Detection claims nearly the whole clip is silent
        let runs = vec![SilenceRun { start: 0.0, end: Some(268.9) }];
        assert_eq!(keep_span(&runs, 269.12), None);
    }

    #[test]
    fn test_keep_span_skips_trivial_trims() {
        // Only 0.1s of trailing silence: not worth a re-encode
        let runs = vec![SilenceRun { start: 269.02, end: None }];
        assert_eq!(keep_span(&runs, 269.12), None);
    }

    #[tokio::test]
    async fn test_trim_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.m4a");
        tokio::fs::write(&path, b"not really audio").await.unwrap();

        let trimmer = SilenceTrimmer::new("/nonexistent/ffmpeg");
        let returned = trimmer.trim(&path).await;

        assert_eq!(returned, path);
        let bytes = tokio::fs::read(&path).await.unwrap();
        assert_eq!(bytes, b"not really audio");
        // No temp file left behind
        assert!(!path.with_extension("trim.m4a").exists());
    }
}
