// Downloader module - orchestration around the external extraction engine

pub mod advisor;
pub mod engine;
pub mod errors;
pub mod formats;
pub mod models;
pub mod orchestrator;
pub mod request;
pub mod session;
pub mod url;
pub mod utils;

pub use advisor::{advise, advise_error, ErrorCategory, Remediation};
pub use engine::{ExtractionEngine, YtDlpEngine};
pub use errors::DownloadError;
pub use formats::ClassifiedFormats;
pub use models::{
    DownloadKind, DownloadRequest, DownloadState, DownloadStatus, EngineConfig, Quality,
    Sidecars, VideoMetadata,
};
pub use orchestrator::{DownloadOutcome, NullSink, Orchestrator, ProgressSink};
pub use session::Session;
