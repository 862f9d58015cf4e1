// URL validation and video ID extraction

use regex::Regex;

lazy_static::lazy_static! {
    /// Accepted URL shapes: canonical watch link, short link, embed link,
    /// legacy /v/ link, mobile watch link.
    static ref URL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/watch\?v=[\w-]+").unwrap(),
        Regex::new(r"^(?:https?://)?(?:www\.)?youtu\.be/[\w-]+").unwrap(),
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/embed/[\w-]+").unwrap(),
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/v/[\w-]+").unwrap(),
        Regex::new(r"^(?:https?://)?(?:m\.)?youtube\.com/watch\?v=[\w-]+").unwrap(),
    ];

    /// Prioritized ID patterns; the first match wins.
    static ref ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").unwrap(),
        Regex::new(r"embed/([0-9A-Za-z_-]{11})").unwrap(),
        Regex::new(r"v/([0-9A-Za-z_-]{11})").unwrap(),
    ];
}

/// Check whether a free-text string matches one of the known URL shapes.
/// Never errors.
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    URL_PATTERNS.iter().any(|p| p.is_match(url))
}

/// Pull the 11-character video ID out of a URL, if present. Strings that
/// fail validation never yield an ID, even when they contain a v= parameter.
pub fn extract_video_id(url: &str) -> Option<String> {
    if !is_valid_url(url) {
        return None;
    }
    for pattern in ID_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            if let Some(id) = caps.get(1) {
                return Some(id.as_str().to_string());
            }
        }
    }
    None
}
