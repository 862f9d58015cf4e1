// Common data models for the download orchestrator

use serde::{Deserialize, Serialize};

/// Video information projected from the extraction engine.
///
/// Only the fields the UI needs survive the boundary; everything else the
/// engine reports is dropped at parse time. Replaced wholesale on refresh,
/// never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub uploader: String,
    /// Duration in seconds (0 when the engine omits it)
    pub duration: u64,
    pub view_count: Option<u64>,
    /// 8-digit calendar string as reported by the engine (YYYYMMDD)
    pub upload_date: Option<String>,
    /// Description truncated to 500 chars
    pub description: String,
    pub thumbnail: Option<String>,
    pub formats: Vec<FormatDescriptor>,
    pub availability: Option<String>,
    pub age_limit: u8,
}

/// One downloadable encoding variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    /// Container extension (mp4, webm, m4a)
    pub ext: String,
    /// Video codec, "none" or absent when audio-only
    pub vcodec: Option<String>,
    /// Audio codec, "none" or absent when video-only
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    /// Average bitrate in kbps (audio bitrate for audio-only streams)
    pub abr: Option<f32>,
    pub tbr: Option<f32>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    /// Transport protocol tag (https, m3u8_native, http_dash_segments, ...)
    pub protocol: Option<String>,
}

impl FormatDescriptor {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |v| v != "none" && !v.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().map_or(false, |a| a != "none" && !a.is_empty())
    }

    /// Get effective file size (exact or approximate)
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// What to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadKind {
    VideoAudio,
    VideoOnly,
    AudioOnly,
}

/// Quality ceiling token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Best,
    Worst,
    /// Resolution ceiling in pixels (video kinds)
    Height(u32),
    /// Bitrate ceiling in kbps (audio-only kind)
    Bitrate(u32),
}

impl Quality {
    /// Parse a user token like "1080p", "192k", "best", "worst".
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "best" => Some(Self::Best),
            "worst" => Some(Self::Worst),
            _ => {
                if let Some(h) = token.strip_suffix('p') {
                    h.parse().ok().map(Self::Height)
                } else if let Some(k) = token.strip_suffix('k') {
                    k.parse().ok().map(Self::Bitrate)
                } else {
                    None
                }
            }
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Worst => write!(f, "worst"),
            Self::Height(h) => write!(f, "{}p", h),
            Self::Bitrate(k) => write!(f, "{}k", k),
        }
    }
}

/// Optional artifacts downloaded alongside the primary media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidecars {
    pub thumbnail: bool,
    pub description: bool,
    pub subtitles: bool,
}

/// A user-selected download configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub kind: DownloadKind,
    pub quality: Quality,
    /// Output container (mp4/mkv/webm/avi for video, mp3/aac/flac/wav/ogg for audio)
    pub container: String,
    pub sidecars: Sidecars,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: DownloadKind::VideoAudio,
            quality: Quality::Best,
            container: "mp4".to_string(),
            sidecars: Sidecars::default(),
        }
    }

    /// Reduced-scope substitution: best audio as mp3, no sidecars.
    pub fn audio_fallback(&self) -> Self {
        Self {
            url: self.url.clone(),
            kind: DownloadKind::AudioOnly,
            quality: Quality::Best,
            container: "mp3".to_string(),
            sidecars: Sidecars::default(),
        }
    }

    /// Reduced-scope substitution: lowest standard quality as mp4, no sidecars.
    pub fn lowest_quality_fallback(&self) -> Self {
        Self {
            url: self.url.clone(),
            kind: DownloadKind::VideoAudio,
            quality: Quality::Height(360),
            container: "mp4".to_string(),
            sidecars: Sidecars::default(),
        }
    }
}

/// Progress of one download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Idle,
    Starting,
    Downloading,
    Finished,
    Error,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

/// Shared mutable state for one in-flight download attempt.
///
/// Written by the background task, read by the foreground poller. Always
/// replaced as a whole record under the lock so a reader never sees a
/// progress value newer than its status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadState {
    pub status: DownloadStatus,
    /// Percentage in [0, 100]
    pub progress: f32,
    pub speed: String,
    pub eta: String,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub error: Option<String>,
}

impl Default for DownloadState {
    fn default() -> Self {
        Self {
            status: DownloadStatus::Idle,
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            total_bytes: 0,
            downloaded_bytes: 0,
            error: None,
        }
    }
}

impl DownloadState {
    pub fn starting() -> Self {
        Self {
            status: DownloadStatus::Starting,
            ..Self::default()
        }
    }
}

/// A simulated client identity presented to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    /// Engine player-client tag (web, android, tv, ios)
    pub player_client: &'static str,
    pub user_agent: &'static str,
}

/// Backoff parameters for the retryable error classes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds
    pub base_delay_secs: u64,
    pub backoff_multiplier: u32,
    /// Upper bound on any single delay, in seconds
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            backoff_multiplier: 2,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    /// Delay before resubmitting after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> std::time::Duration {
        let exp = failures.saturating_sub(1).min(16);
        let secs = self
            .base_delay_secs
            .saturating_mul(u64::from(self.backoff_multiplier).saturating_pow(exp))
            .min(self.max_delay_secs);
        std::time::Duration::from_secs(secs)
    }
}

/// Engine configuration profile.
///
/// The anti-blocking "hardened" behavior is a profile of this one struct,
/// not a separate code path: a longer client list, a sleep interval between
/// requests, and a bigger retry budget.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ordered client identities; rotation advances through this list
    pub clients: Vec<ClientProfile>,
    /// Socket timeout passed to the engine, in seconds
    pub timeout_secs: u32,
    /// Seconds to sleep between engine requests (anti-blocking)
    pub sleep_interval_secs: Option<u32>,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    pub retry: RetryConfig,
}

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36";

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl EngineConfig {
    /// Plain profile: one browser identity, no pacing.
    pub fn standard() -> Self {
        Self {
            clients: vec![ClientProfile {
                player_client: "web",
                user_agent: CHROME_UA,
            }],
            timeout_secs: 30,
            sleep_interval_secs: None,
            proxy: None,
            retry: RetryConfig::default(),
        }
    }

    /// Anti-blocking profile: rotated identities, request pacing, larger
    /// retry budget.
    pub fn hardened() -> Self {
        Self {
            clients: vec![
                ClientProfile {
                    player_client: "android",
                    user_agent: ANDROID_UA,
                },
                ClientProfile {
                    player_client: "tv",
                    user_agent: CHROME_UA,
                },
                ClientProfile {
                    player_client: "web",
                    user_agent: SAFARI_UA,
                },
            ],
            timeout_secs: 30,
            sleep_interval_secs: Some(2),
            proxy: None,
            retry: RetryConfig {
                max_attempts: 4,
                ..RetryConfig::default()
            },
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Client identity for the given rotation index (wraps around).
    pub fn client(&self, rotation: usize) -> &ClientProfile {
        &self.clients[rotation % self.clients.len()]
    }
}
