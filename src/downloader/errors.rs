// Error taxonomy for the download orchestrator

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// URL failed validation before any engine call
    InvalidInput(String),

    /// Video is private, deleted, or otherwise unavailable
    PrivateOrUnavailable,

    /// Video removed or blocked for copyright reasons
    CopyrightBlocked,

    /// Video is not available in the current region
    GeoBlocked,

    /// Engine reported rate limiting (429, too many requests)
    RateLimited,

    /// Engine reported an access-denied class rejection (403, bot check)
    AccessDenied,

    /// Live/segmented streaming content - not downloadable here
    StreamingFormatUnsupported,

    /// yt-dlp binary not found on this system
    ToolNotFound(String),

    /// Failed to parse engine JSON output
    ParseError(String),

    /// Metadata extraction failed with an unclassified engine message
    ExtractionFailed(String),

    /// Transfer failed with an unclassified engine message
    DownloadFailed(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(url) => write!(f, "Invalid URL: {}", url),
            Self::PrivateOrUnavailable => write!(f, "Video is private or unavailable"),
            Self::CopyrightBlocked => write!(f, "Video is blocked for copyright reasons"),
            Self::GeoBlocked => write!(f, "Video is geo-blocked in your region"),
            Self::RateLimited => write!(f, "The platform is rate-limiting requests"),
            Self::AccessDenied => write!(f, "The platform denied access to this request"),
            Self::StreamingFormatUnsupported => {
                write!(f, "Live or segmented streaming content cannot be downloaded")
            }
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::ExtractionFailed(msg) => write!(f, "Extraction failed: {}", msg),
            Self::DownloadFailed(msg) => write!(f, "Download failed: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl DownloadError {
    /// Retryable with a different client identity and backoff delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::AccessDenied)
    }

    /// Classify an engine message into a specific category, if any matches.
    ///
    /// Checked in a fixed priority order; messages carrying several keywords
    /// (e.g. a geo error that also says "unavailable") resolve to the first
    /// match. The order follows what the platform's wording makes least
    /// ambiguous in practice, not a guarantee from the engine.
    fn classify(msg: &str) -> Option<Self> {
        let lower = msg.to_lowercase();

        if lower.contains("private") || lower.contains("unavailable") {
            return Some(Self::PrivateOrUnavailable);
        }

        if lower.contains("copyright") {
            return Some(Self::CopyrightBlocked);
        }

        if lower.contains("geo") || lower.contains("blocked") {
            return Some(Self::GeoBlocked);
        }

        if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
        {
            return Some(Self::RateLimited);
        }

        if lower.contains("403")
            || lower.contains("forbidden")
            || lower.contains("bot")
            || lower.contains("captcha")
            || lower.contains("sign in to confirm")
        {
            return Some(Self::AccessDenied);
        }

        if lower.contains("m3u8")
            || lower.contains("fragment")
            || lower.contains("live stream")
            || lower.contains("is live")
        {
            return Some(Self::StreamingFormatUnsupported);
        }

        None
    }

    /// Classify an engine message from the metadata path.
    pub fn from_extraction(msg: String) -> Self {
        Self::classify(&msg).unwrap_or(Self::ExtractionFailed(msg))
    }

    /// Classify an engine message from the transfer path.
    pub fn from_transfer(msg: String) -> Self {
        Self::classify(&msg).unwrap_or(Self::DownloadFailed(msg))
    }

    /// Raw diagnostic text, where one was captured.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::InvalidInput(s)
            | Self::ToolNotFound(s)
            | Self::ParseError(s)
            | Self::ExtractionFailed(s)
            | Self::DownloadFailed(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        Self::from_extraction(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_video_detection() {
        let err = DownloadError::from_extraction("ERROR: private video".to_string());
        assert_eq!(err, DownloadError::PrivateOrUnavailable);
    }

    #[test]
    fn test_unavailable_detection() {
        let err = DownloadError::from_extraction("This video is unavailable".to_string());
        assert_eq!(err, DownloadError::PrivateOrUnavailable);
    }

    #[test]
    fn test_unavailable_wins_over_geo() {
        // Order sensitivity: both keywords present, private/unavailable checked first
        let err = DownloadError::from_extraction(
            "Video unavailable. The uploader has not made this video available in your country"
                .to_string(),
        );
        assert_eq!(err, DownloadError::PrivateOrUnavailable);
    }

    #[test]
    fn test_copyright_detection() {
        let err = DownloadError::from_extraction("removed due to a copyright claim".to_string());
        assert_eq!(err, DownloadError::CopyrightBlocked);
    }

    #[test]
    fn test_geo_detection() {
        let err = DownloadError::from_extraction("geo restriction applies".to_string());
        assert_eq!(err, DownloadError::GeoBlocked);
        let err = DownloadError::from_extraction("blocked in your region".to_string());
        assert_eq!(err, DownloadError::GeoBlocked);
    }

    #[test]
    fn test_rate_limit_detection() {
        let err = DownloadError::from_extraction("HTTP Error 429: Too Many Requests".to_string());
        assert_eq!(err, DownloadError::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_access_denied_detection() {
        let err = DownloadError::from_transfer("HTTP Error 403: Forbidden".to_string());
        assert_eq!(err, DownloadError::AccessDenied);
        assert!(err.is_retryable());

        let err = DownloadError::from_transfer("Sign in to confirm you're not a bot".to_string());
        assert_eq!(err, DownloadError::AccessDenied);
    }

    #[test]
    fn test_streaming_detection() {
        let err = DownloadError::from_transfer("fragment 3 not found".to_string());
        assert_eq!(err, DownloadError::StreamingFormatUnsupported);
    }

    #[test]
    fn test_generic_fallthrough_by_phase() {
        let msg = "something entirely new went wrong";
        assert_eq!(
            DownloadError::from_extraction(msg.to_string()),
            DownloadError::ExtractionFailed(msg.to_string())
        );
        assert_eq!(
            DownloadError::from_transfer(msg.to_string()),
            DownloadError::DownloadFailed(msg.to_string())
        );
    }

    #[test]
    fn test_terminal_classes_not_retryable() {
        assert!(!DownloadError::PrivateOrUnavailable.is_retryable());
        assert!(!DownloadError::CopyrightBlocked.is_retryable());
        assert!(!DownloadError::GeoBlocked.is_retryable());
        assert!(!DownloadError::StreamingFormatUnsupported.is_retryable());
        assert!(!DownloadError::InvalidInput("x".into()).is_retryable());
    }
}
