//! tunehunt - resolve catalog tracks against a video platform and archive
//! them as tagged audio files
//!
//! The pipeline per track: resolve a platform URL via ranked text search,
//! fetch and transcode the audio, trim leading/trailing silence, write
//! catalog tags, then record the download keyed by (user, track) so
//! re-runs are idempotent.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod track;

pub use config::Config;
pub use db::Database;
pub use error::PipelineError;
pub use track::TrackDescriptor;
