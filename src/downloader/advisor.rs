// Error categorization and user-facing remediation advice

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// User-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    RateLimited,
    AccessDenied,
    PrivateOrUnavailable,
    Copyright,
    GeoBlocked,
    StreamingUnsupported,
    Generic,
}

impl ErrorCategory {
    /// Short headline shown above the raw diagnostic.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::RateLimited => "Rate limiting issue",
            Self::AccessDenied => "Access denied",
            Self::PrivateOrUnavailable => "Video access issue",
            Self::Copyright => "Copyright protected",
            Self::GeoBlocked => "Geographic restriction",
            Self::StreamingUnsupported => "Streaming format issue",
            Self::Generic => "General troubleshooting",
        }
    }

    /// Whether an audio-only reduced-scope retry is worth offering.
    pub fn offers_audio_fallback(&self) -> bool {
        matches!(self, Self::RateLimited | Self::AccessDenied | Self::Generic)
    }

    /// Whether a lowest-quality reduced-scope retry is worth offering.
    pub fn offers_low_quality_fallback(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::AccessDenied | Self::StreamingUnsupported | Self::Generic
        )
    }
}

/// A classified failure with at least one suggested remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    pub category: ErrorCategory,
    pub suggestions: Vec<String>,
}

/// Classify raw engine error text. Pure; no side effects.
pub fn advise(raw: &str) -> Remediation {
    advise_error(&DownloadError::from_transfer(raw.to_string()))
}

/// Classify an already-typed failure.
pub fn advise_error(error: &DownloadError) -> Remediation {
    let category = match error {
        DownloadError::RateLimited => ErrorCategory::RateLimited,
        DownloadError::AccessDenied => ErrorCategory::AccessDenied,
        DownloadError::PrivateOrUnavailable => ErrorCategory::PrivateOrUnavailable,
        DownloadError::CopyrightBlocked => ErrorCategory::Copyright,
        DownloadError::GeoBlocked => ErrorCategory::GeoBlocked,
        DownloadError::StreamingFormatUnsupported => ErrorCategory::StreamingUnsupported,
        _ => ErrorCategory::Generic,
    };

    Remediation {
        category,
        suggestions: suggestions_for(category),
    }
}

fn suggestions_for(category: ErrorCategory) -> Vec<String> {
    let lines: &[&str] = match category {
        ErrorCategory::RateLimited => &[
            "Wait 5-10 minutes before trying again",
            "Try downloading without subtitles",
            "Use a VPN to change your IP address",
        ],
        ErrorCategory::AccessDenied => &[
            "Use a VPN or proxy",
            "Wait and try again later",
            "Try the audio-only fallback",
        ],
        ErrorCategory::PrivateOrUnavailable => &[
            "Video is private or has been removed",
            "Check if the URL is correct",
            "Video might be restricted in your region",
        ],
        ErrorCategory::Copyright => &[
            "This video cannot be downloaded due to copyright restrictions",
        ],
        ErrorCategory::GeoBlocked => &[
            "Video is blocked in your region",
            "Try using a VPN",
            "Some content is region-specific",
        ],
        ErrorCategory::StreamingUnsupported => &[
            "Live streams or adaptive formats detected",
            "Try a different quality setting",
            "Some live content cannot be downloaded",
        ],
        ErrorCategory::Generic => &[
            "Check your internet connection",
            "Try a different video quality",
            "Restart the application if issues persist",
        ],
    };
    lines.iter().map(|s| s.to_string()).collect()
}
