//! Error taxonomy for the download pipeline
//!
//! Only three error kinds terminate an item: no acceptable search match,
//! a failed fetch/transcode, and a failed persistence step. Silence
//! trimming and tag writing are best-effort and never surface here; their
//! failures are logged at the call site and the pipeline continues.

use thiserror::Error;

/// Item-terminal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Resolution exhausted every query without an acceptable candidate.
    /// A valid negative outcome, not a fault.
    #[error("no acceptable match found")]
    NoMatchFound,

    /// The remote asset could not be downloaded or transcoded
    #[error("fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),

    /// Checksum/record/history persistence failed; the whole record step
    /// is retryable as a unit
    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl PipelineError {
    /// Short reason string for batch reports
    pub fn reason(&self) -> String {
        match self {
            PipelineError::NoMatchFound => "no acceptable match found".to_string(),
            PipelineError::Fetch(e) => format!("fetch failed: {e:#}"),
            PipelineError::Persistence(e) => format!("persistence failed: {e:#}"),
        }
    }
}
