// DownloadRequest -> engine options compilation

use std::path::Path;

use super::models::{DownloadKind, DownloadRequest, Quality};

/// Height ceiling used when a video request asks for "best"
const BEST_HEIGHT_CEILING: u32 = 2160;

/// Audio containers that require a transcode post-processing step
const TRANSCODE_CONTAINERS: [&str; 5] = ["mp3", "aac", "flac", "wav", "ogg"];

/// Video containers the engine can merge/remux into
const MERGE_CONTAINERS: [&str; 4] = ["mp4", "mkv", "webm", "avi"];

/// Subtitle languages requested when the sidecar is enabled
const SUBTITLE_LANGS: &str = "en,en-US,en-GB";

/// Audio transcode directive for the engine's post-processing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    pub codec: String,
    /// Preferred quality in kbps, as the engine expects it
    pub quality: String,
}

/// Compiled engine options for one download.
///
/// Pure data; rendering into argv happens in `cli_args` so compilation
/// stays deterministic and testable without a subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub format_selector: String,
    pub merge_output_format: Option<String>,
    pub audio_transcode: Option<AudioTranscode>,
    pub write_thumbnail: bool,
    pub write_description: bool,
    pub write_subtitles: bool,
}

/// Derive engine options from a user request.
///
/// Selector strings follow the engine's own fallback syntax: the most
/// constrained expression first, progressively relaxing.
pub fn compile(request: &DownloadRequest) -> EngineOptions {
    let format_selector = match request.kind {
        DownloadKind::VideoAudio => video_audio_selector(request.quality),
        DownloadKind::VideoOnly => video_only_selector(request.quality),
        DownloadKind::AudioOnly => audio_only_selector(request.quality),
    };

    let container = request.container.to_lowercase();

    let merge_output_format = match request.kind {
        DownloadKind::VideoAudio if MERGE_CONTAINERS.contains(&container.as_str()) => {
            Some(container.clone())
        }
        _ => None,
    };

    let audio_transcode = match request.kind {
        DownloadKind::AudioOnly if TRANSCODE_CONTAINERS.contains(&container.as_str()) => {
            Some(AudioTranscode {
                codec: container,
                quality: match request.quality {
                    Quality::Bitrate(k) => k.to_string(),
                    _ => "192".to_string(),
                },
            })
        }
        _ => None,
    };

    EngineOptions {
        format_selector,
        merge_output_format,
        audio_transcode,
        write_thumbnail: request.sidecars.thumbnail,
        write_description: request.sidecars.description,
        write_subtitles: request.sidecars.subtitles,
    }
}

fn video_audio_selector(quality: Quality) -> String {
    match quality {
        Quality::Worst => {
            "worstvideo[ext=mp4]+worstaudio[ext=m4a]/worstvideo+worstaudio/worst".to_string()
        }
        Quality::Height(h) => bounded_video_audio(h),
        // Bitrate ceilings do not apply to video kinds
        Quality::Best | Quality::Bitrate(_) => bounded_video_audio(BEST_HEIGHT_CEILING),
    }
}

fn bounded_video_audio(h: u32) -> String {
    format!(
        "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best[height<={h}]"
    )
}

fn video_only_selector(quality: Quality) -> String {
    match quality {
        Quality::Worst => "worstvideo[ext=mp4]/worstvideo".to_string(),
        Quality::Height(h) => {
            format!("bestvideo[height<={h}][ext=mp4]/bestvideo[height<={h}]")
        }
        Quality::Best | Quality::Bitrate(_) => format!(
            "bestvideo[height<={h}][ext=mp4]/bestvideo[height<={h}]/bestvideo",
            h = BEST_HEIGHT_CEILING
        ),
    }
}

fn audio_only_selector(quality: Quality) -> String {
    match quality {
        Quality::Worst => "worstaudio[ext=m4a]/worstaudio".to_string(),
        Quality::Bitrate(k) => {
            format!("bestaudio[abr<={k}][ext=m4a]/bestaudio[abr<={k}]")
        }
        // Height ceilings do not apply to audio
        Quality::Best | Quality::Height(_) => "bestaudio[ext=m4a]/bestaudio".to_string(),
    }
}

impl EngineOptions {
    /// Render the option-specific part of the engine argv. Network and
    /// client-identity flags are appended by the engine itself.
    pub fn cli_args(&self, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.format_selector.clone(),
            "-o".to_string(),
            format!("{}/%(title)s.%(ext)s", output_dir.display()),
            "--restrict-filenames".to_string(),
            "--windows-filenames".to_string(),
        ];

        if let Some(fmt) = &self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(fmt.clone());
        }

        if let Some(transcode) = &self.audio_transcode {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(transcode.codec.clone());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", transcode.quality));
        }

        if self.write_thumbnail {
            args.push("--write-thumbnail".to_string());
        }
        if self.write_description {
            args.push("--write-description".to_string());
        }
        if self.write_subtitles {
            args.push("--write-subs".to_string());
            args.push("--write-auto-subs".to_string());
            args.push("--sub-langs".to_string());
            args.push(SUBTITLE_LANGS.to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::Sidecars;
    use std::path::PathBuf;

    fn request(kind: DownloadKind, quality: Quality, container: &str) -> DownloadRequest {
        DownloadRequest {
            url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            kind,
            quality,
            container: container.to_string(),
            sidecars: Sidecars::default(),
        }
    }

    #[test]
    fn test_video_audio_1080p_mp4() {
        let opts = compile(&request(DownloadKind::VideoAudio, Quality::Height(1080), "mp4"));
        assert_eq!(
            opts.format_selector,
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<=1080]+bestaudio/best[height<=1080]"
        );
        assert_eq!(opts.merge_output_format.as_deref(), Some("mp4"));
        assert!(opts.audio_transcode.is_none());
    }

    #[test]
    fn test_video_only_has_no_audio_fallback() {
        let opts = compile(&request(DownloadKind::VideoOnly, Quality::Height(720), "mp4"));
        assert!(!opts.format_selector.contains("audio"));
        assert!(!opts.format_selector.contains("/best["));
        assert_eq!(
            opts.format_selector,
            "bestvideo[height<=720][ext=mp4]/bestvideo[height<=720]"
        );
        assert!(opts.merge_output_format.is_none());
    }

    #[test]
    fn test_audio_192k_mp3_transcode() {
        let opts = compile(&request(DownloadKind::AudioOnly, Quality::Bitrate(192), "mp3"));
        assert_eq!(
            opts.format_selector,
            "bestaudio[abr<=192][ext=m4a]/bestaudio[abr<=192]"
        );
        assert_eq!(
            opts.audio_transcode,
            Some(AudioTranscode {
                codec: "mp3".to_string(),
                quality: "192".to_string(),
            })
        );
    }

    #[test]
    fn test_audio_best_without_transcode_container() {
        let opts = compile(&request(DownloadKind::AudioOnly, Quality::Best, "m4a"));
        assert_eq!(opts.format_selector, "bestaudio[ext=m4a]/bestaudio");
        assert!(opts.audio_transcode.is_none());
    }

    #[test]
    fn test_worst_token_selects_worst_chain() {
        let opts = compile(&request(DownloadKind::VideoAudio, Quality::Worst, "mp4"));
        assert_eq!(
            opts.format_selector,
            "worstvideo[ext=mp4]+worstaudio[ext=m4a]/worstvideo+worstaudio/worst"
        );

        let opts = compile(&request(DownloadKind::AudioOnly, Quality::Worst, "m4a"));
        assert_eq!(opts.format_selector, "worstaudio[ext=m4a]/worstaudio");
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let req = DownloadRequest {
            sidecars: Sidecars {
                thumbnail: true,
                description: false,
                subtitles: true,
            },
            ..request(DownloadKind::VideoAudio, Quality::Best, "mkv")
        };
        let a = compile(&req);
        let b = compile(&req);
        assert_eq!(a, b);

        let dir = PathBuf::from("/tmp/session");
        assert_eq!(a.cli_args(&dir), b.cli_args(&dir));
    }

    #[test]
    fn test_sidecar_flags_map_to_directives() {
        let req = DownloadRequest {
            sidecars: Sidecars {
                thumbnail: true,
                description: true,
                subtitles: true,
            },
            ..request(DownloadKind::VideoAudio, Quality::Best, "mp4")
        };
        let args = compile(&req).cli_args(&PathBuf::from("/tmp/x"));
        assert!(args.contains(&"--write-thumbnail".to_string()));
        assert!(args.contains(&"--write-description".to_string()));
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(args.contains(&"en,en-US,en-GB".to_string()));
    }
}
