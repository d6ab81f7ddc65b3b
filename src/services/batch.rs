//! Concurrent batch orchestration
//!
//! Runs the resolve/fetch/trim/tag/record pipeline over a list of tracks
//! with bounded concurrency. Items are independent: a failure is captured
//! in the report and never aborts the batch. Failures keep their original
//! submission order in the report regardless of completion order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::PipelineError;
use crate::services::fetcher::AssetFetcher;
use crate::services::recorder::DownloadRecorder;
use crate::services::resolver::CandidateResolver;
use crate::services::tagger::{self, TagFields};
use crate::services::trimmer::SilenceTrimmer;
use crate::track::TrackDescriptor;

/// Where an item is in its pipeline run. Items advance strictly forward;
/// a failure freezes the item at the stage it died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Resolving,
    Fetching,
    Normalizing,
    Tagging,
    Recording,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Resolving => "resolving",
            Stage::Fetching => "fetching",
            Stage::Normalizing => "normalizing",
            Stage::Tagging => "tagging",
            Stage::Recording => "recording",
            Stage::Done => "done",
        }
    }
}

/// One failed batch item
#[derive(Debug)]
pub struct BatchFailure {
    pub track: TrackDescriptor,
    pub reason: String,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

pub struct BatchOrchestrator {
    resolver: CandidateResolver,
    fetcher: Arc<dyn AssetFetcher>,
    trimmer: SilenceTrimmer,
    recorder: DownloadRecorder,
    output_dir: PathBuf,
    worker_count: usize,
}

impl BatchOrchestrator {
    pub fn new(
        db: Database,
        resolver: CandidateResolver,
        fetcher: Arc<dyn AssetFetcher>,
        trimmer: SilenceTrimmer,
        output_dir: PathBuf,
        worker_count: usize,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            trimmer,
            recorder: DownloadRecorder::new(db),
            output_dir,
            worker_count,
        }
    }

    /// Process every track for `user_id`, at most `worker_count` at a time
    pub async fn run_batch(&self, user_id: i64, tracks: Vec<TrackDescriptor>) -> BatchReport {
        let total = tracks.len();
        let started = Instant::now();
        info!(total, workers = self.worker_count, "Starting batch");

        let outcomes: Vec<(usize, Result<(), BatchFailure>)> =
            stream::iter(tracks.into_iter().enumerate())
                .map(|(index, track)| async move {
                    let outcome = match self.process_item(user_id, &track).await {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            match e {
                                PipelineError::NoMatchFound => {
                                    warn!(track = %track.display(), "Skipping: {}", e.reason())
                                }
                                _ => error!(track = %track.display(), "Failed: {}", e.reason()),
                            }
                            Err(BatchFailure {
                                reason: e.reason(),
                                track,
                            })
                        }
                    };
                    (index, outcome)
                })
                .buffer_unordered(self.worker_count.max(1))
                .collect()
                .await;

        let mut report = BatchReport::default();
        let mut failures: Vec<(usize, BatchFailure)> = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(failure) => failures.push((index, failure)),
            }
        }
        failures.sort_by_key(|(index, _)| *index);
        report.failed = failures.into_iter().map(|(_, f)| f).collect();

        info!(
            total,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Batch finished"
        );
        report
    }

    async fn process_item(
        &self,
        user_id: i64,
        track: &TrackDescriptor,
    ) -> Result<(), PipelineError> {
        debug!(track = %track.display(), stage = Stage::Resolving.as_str(), "Item advancing");
        let resolved = self.resolver.resolve(track).await?;
        info!(track = %track.display(), url = %resolved.url, "Resolved");

        debug!(track = %track.display(), stage = Stage::Fetching.as_str(), "Item advancing");
        let asset = self
            .fetcher
            .fetch(&resolved.url, &track.display(), &self.output_dir)
            .await
            .map_err(PipelineError::Fetch)?;

        debug!(track = %track.display(), stage = Stage::Normalizing.as_str(), "Item advancing");
        let path = self.trimmer.trim(&asset.path).await;

        debug!(track = %track.display(), stage = Stage::Tagging.as_str(), "Item advancing");
        let fields = TagFields::from_descriptor(track);
        let tag_path = path.clone();
        match tokio::task::spawn_blocking(move || tagger::write_tags(&tag_path, &fields)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(track = %track.display(), error = %e, "Tag write failed, keeping untagged file");
            }
            Err(e) => {
                warn!(track = %track.display(), error = %e, "Tag task failed, keeping untagged file");
            }
        }

        debug!(track = %track.display(), stage = Stage::Recording.as_str(), "Item advancing");
        self.recorder
            .record(user_id, track, &asset)
            .await
            .map_err(PipelineError::Persistence)?;

        debug!(track = %track.display(), stage = Stage::Done.as_str(), "Item finished");
        Ok(())
    }
}
