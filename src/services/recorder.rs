//! Persisting completed downloads
//!
//! The recorder is the last pipeline stage: it checksums the finished file,
//! ensures the catalog track row exists, and records the download once per
//! (user, track). Re-processing the same track for the same user lands on
//! the existing row, so batch retries are safe.

use anyhow::Result;
use tracing::{debug, info};

use crate::db::{CreateDownload, Database};
use crate::services::checksum::sha256_file;
use crate::services::fetcher::{FetchedAsset, TARGET_BITRATE_KBPS};
use crate::track::TrackDescriptor;

pub struct DownloadRecorder {
    db: Database,
}

impl DownloadRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a finished download, returning the surviving download row id
    pub async fn record(
        &self,
        user_id: i64,
        track: &TrackDescriptor,
        asset: &FetchedAsset,
    ) -> Result<i64> {
        let checksum = sha256_file(&asset.path).await?;
        let filesize_bytes = tokio::fs::metadata(&asset.path)
            .await
            .ok()
            .map(|m| m.len() as i64)
            .or(asset.approx_size_bytes);

        let track_id = self.db.tracks().get_or_create(track).await?;
        self.db.tracks().set_checksum(track_id, &checksum).await?;

        let downloads = self.db.downloads();
        let download_id = downloads
            .insert_ignoring_duplicates(CreateDownload {
                user_id,
                track_id,
                remote_id: Some(asset.remote_id.clone()),
                file_path: asset.path.display().to_string(),
                checksum: checksum.clone(),
                bitrate: TARGET_BITRATE_KBPS,
                filesize_bytes,
            })
            .await?;
        downloads
            .append_history(user_id, track_id, "downloaded")
            .await?;

        debug!(track = %track.display(), checksum = %checksum, "Checksummed download");
        info!(
            user_id,
            track_id,
            download_id,
            path = %asset.path.display(),
            "Recorded download"
        );
        Ok(download_id)
    }
}
