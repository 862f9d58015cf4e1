// Extraction engine boundary - yt-dlp consumed as an opaque subprocess
//
// The engine resolves a URL to stream metadata and performs the actual
// transfer. Everything platform-specific (player response parsing,
// signature handling, segment selection, muxing) lives on the far side of
// this boundary.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use super::errors::DownloadError;
use super::models::{
    DownloadState, DownloadStatus, EngineConfig, FormatDescriptor, VideoMetadata,
};
use super::request::EngineOptions;
use super::utils::run_output_with_timeout;

/// Description truncation bound applied at the boundary
const DESCRIPTION_LIMIT: usize = 500;

/// Seam between the orchestrator and the extraction engine.
///
/// `rotation` selects the client identity from the config's ordered list;
/// the orchestrator advances it between retry attempts.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Check if the engine is usable on this system
    fn is_available(&self) -> bool;

    /// Metadata-only extraction, no transfer.
    async fn fetch_metadata(
        &self,
        url: &str,
        config: &EngineConfig,
        rotation: usize,
    ) -> Result<VideoMetadata, DownloadError>;

    /// Transfer into `output_dir`, mutating `state` as progress arrives.
    async fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        config: &EngineConfig,
        rotation: usize,
        output_dir: &Path,
        state: Arc<Mutex<DownloadState>>,
    ) -> Result<(), DownloadError>;
}

/// yt-dlp binary wrapper.
pub struct YtDlpEngine {
    ytdlp_path: String,
}

impl YtDlpEngine {
    pub fn new() -> Self {
        Self {
            ytdlp_path: find_ytdlp(),
        }
    }

    /// Common argv prefix: network, pacing, and client identity.
    fn base_args(&self, url: &str, config: &EngineConfig, rotation: usize) -> Vec<String> {
        let client = config.client(rotation);

        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.timeout_secs.to_string(),
            "--retries".to_string(),
            "2".to_string(),
            "--user-agent".to_string(),
            client.user_agent.to_string(),
        ];

        let is_youtube =
            url.to_lowercase().contains("youtube.com") || url.to_lowercase().contains("youtu.be");
        if is_youtube {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client.player_client));
        }

        if let Some(sleep) = config.sleep_interval_secs {
            args.push("--sleep-requests".to_string());
            args.push(sleep.to_string());
        }

        if let Some(proxy) = &config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        match std::process::Command::new(&self.ytdlp_path)
            .arg("--version")
            .output()
        {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    async fn fetch_metadata(
        &self,
        url: &str,
        config: &EngineConfig,
        rotation: usize,
    ) -> Result<VideoMetadata, DownloadError> {
        let mut args = vec!["--dump-json".to_string()];
        args.extend(self.base_args(url, config, rotation));
        args.push(url.to_string());

        eprintln!(
            "[Engine] Fetching metadata via client '{}'",
            config.client(rotation).player_client
        );

        // Allow slack beyond the engine's own socket timeout
        let output =
            run_output_with_timeout(&self.ytdlp_path, args, u64::from(config.timeout_secs) + 15)
                .await
                .map_err(|e| {
                    if e.starts_with("Failed to start") {
                        DownloadError::ToolNotFound(e)
                    } else {
                        DownloadError::ExtractionFailed(e)
                    }
                })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::from_extraction(stderr.to_string()));
        }

        parse_metadata(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        config: &EngineConfig,
        rotation: usize,
        output_dir: &Path,
        state: Arc<Mutex<DownloadState>>,
    ) -> Result<(), DownloadError> {
        let mut args = options.cli_args(output_dir);
        args.extend(self.base_args(url, config, rotation));
        args.push("--newline".to_string());
        args.push(url.to_string());

        eprintln!(
            "[Engine] Starting download via client '{}'",
            config.client(rotation).player_client
        );

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DownloadError::ToolNotFound(format!("{}: {}", self.ytdlp_path, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::DownloadFailed("Failed to capture stdout".into()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::DownloadFailed("Failed to capture stderr".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(update) = parse_progress_line(&line) {
                let mut guard = state.lock().expect("download state poisoned");
                *guard = update;
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::DownloadFailed(format!("Failed to wait: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            let mut guard = state.lock().expect("download state poisoned");
            let total = guard.total_bytes;
            *guard = DownloadState {
                status: DownloadStatus::Finished,
                progress: 100.0,
                speed: String::new(),
                eta: "Complete".to_string(),
                total_bytes: total,
                downloaded_bytes: total,
                error: None,
            };
            Ok(())
        } else {
            let raw = String::from_utf8_lossy(&stderr).to_string();
            let err = DownloadError::from_transfer(raw.clone());
            let mut guard = state.lock().expect("download state poisoned");
            *guard = DownloadState {
                status: DownloadStatus::Error,
                error: Some(raw),
                ..DownloadState::default()
            };
            Err(err)
        }
    }
}

// Find yt-dlp executable in common paths
fn find_ytdlp() -> String {
    let common_paths = [
        "/opt/homebrew/bin/yt-dlp",
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
    ];

    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }

    if let Ok(output) = std::process::Command::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    "yt-dlp".to_string()
}

/// Project engine JSON into VideoMetadata, dropping everything else.
fn parse_metadata(stdout: &[u8]) -> Result<VideoMetadata, DownloadError> {
    let json_str = String::from_utf8_lossy(stdout);
    let json: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

    let formats = json["formats"]
        .as_array()
        .map(|array| array.iter().map(parse_format).collect())
        .unwrap_or_default();

    let description: String = json["description"]
        .as_str()
        .unwrap_or("")
        .chars()
        .take(DESCRIPTION_LIMIT)
        .collect();

    Ok(VideoMetadata {
        id: json["id"].as_str().unwrap_or("unknown").to_string(),
        title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
        uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
        duration: json["duration"].as_f64().unwrap_or(0.0) as u64,
        view_count: json["view_count"].as_u64(),
        upload_date: json["upload_date"].as_str().map(|s| s.to_string()),
        description,
        thumbnail: json["thumbnail"].as_str().map(|s| s.to_string()),
        formats,
        availability: json["availability"].as_str().map(|s| s.to_string()),
        age_limit: json["age_limit"].as_u64().unwrap_or(0) as u8,
    })
}

fn parse_format(f: &serde_json::Value) -> FormatDescriptor {
    FormatDescriptor {
        format_id: f["format_id"].as_str().unwrap_or("").to_string(),
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
        acodec: f["acodec"].as_str().map(|s| s.to_string()),
        height: f["height"].as_u64().map(|h| h as u32),
        fps: f["fps"].as_f64().map(|v| v as f32),
        abr: f["abr"].as_f64().map(|v| v as f32),
        tbr: f["tbr"].as_f64().map(|v| v as f32),
        filesize: f["filesize"].as_u64(),
        filesize_approx: f["filesize_approx"].as_u64(),
        protocol: f["protocol"].as_str().map(|s| s.to_string()),
    }
}

lazy_static::lazy_static! {
    // [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*)\s*([KMGT]?i?B)\s+at\s+(\S+)(?:\s+ETA\s+(\S+))?"
    ).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
}

/// Parse one engine progress line into a full state record, or None for
/// lines that carry no state change.
pub fn parse_progress_line(line: &str) -> Option<DownloadState> {
    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size_value: f64 = caps.get(2)?.as_str().parse().ok()?;
        let size_unit = caps.get(3)?.as_str();
        let speed = caps.get(4).map(|m| m.as_str()).unwrap_or("?").to_string();
        let eta = caps.get(5).map(|m| m.as_str()).unwrap_or("").to_string();

        let total_bytes = to_bytes(size_value, size_unit);
        let downloaded_bytes = (total_bytes as f64 * f64::from(percent) / 100.0) as u64;

        return Some(DownloadState {
            status: DownloadStatus::Downloading,
            progress: percent.min(100.0),
            speed,
            eta,
            total_bytes,
            downloaded_bytes,
            error: None,
        });
    }

    if DEST_RE.is_match(line) {
        return Some(DownloadState::starting());
    }

    if MERGE_RE.is_match(line) {
        return Some(DownloadState {
            status: DownloadStatus::Downloading,
            progress: 99.0,
            eta: "merging".to_string(),
            ..DownloadState::default()
        });
    }

    if ALREADY_RE.is_match(line) {
        return Some(DownloadState {
            status: DownloadStatus::Finished,
            progress: 100.0,
            ..DownloadState::default()
        });
    }

    None
}

fn to_bytes(value: f64, unit: &str) -> u64 {
    let multiplier: f64 = match unit {
        "B" => 1.0,
        "KiB" | "KB" => 1024.0,
        "MiB" | "MB" => 1024.0 * 1024.0,
        "GiB" | "GB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" | "TB" => 1024.0_f64.powi(4),
        _ => 1.0,
    };
    (value * multiplier) as u64
}
