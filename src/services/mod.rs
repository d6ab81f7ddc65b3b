//! Pipeline stages and orchestration

pub mod batch;
pub mod checksum;
pub mod fetcher;
pub mod recorder;
pub mod resolver;
pub mod search;
pub mod tagger;
pub mod trimmer;

pub use batch::{BatchFailure, BatchOrchestrator, BatchReport, Stage};
pub use fetcher::{AssetFetcher, FetchedAsset, YtDlpFetcher};
pub use recorder::DownloadRecorder;
pub use resolver::{CandidateResolver, ResolvedMatch, ResolverConfig};
pub use search::{SearchBackend, SearchHit, YtDlpSearch};
pub use trimmer::SilenceTrimmer;
