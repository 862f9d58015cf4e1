pub mod downloader;

pub use downloader::{
    advise, advise_error, ClassifiedFormats, DownloadError, DownloadKind, DownloadOutcome,
    DownloadRequest, DownloadState, DownloadStatus, EngineConfig, ErrorCategory,
    ExtractionEngine, Orchestrator, ProgressSink, Quality, Remediation, Session, Sidecars,
    VideoMetadata, YtDlpEngine,
};
