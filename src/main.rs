// ytgrab - interactive prompt loop around the download orchestrator

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use ytgrab::downloader::utils::{
    format_duration, format_filesize, format_number, format_upload_date, get_network_status_info,
};
use ytgrab::downloader::{
    advise_error, url, ClassifiedFormats, DownloadError, DownloadKind, DownloadRequest,
    DownloadState, DownloadStatus, EngineConfig, ErrorCategory, ExtractionEngine, Orchestrator,
    ProgressSink, Quality, Session, Sidecars, VideoMetadata, YtDlpEngine,
};

#[derive(Parser, Debug)]
#[command(name = "ytgrab", about = "Interactive CLI downloader built on yt-dlp")]
struct Args {
    /// Use the anti-blocking profile (rotated client identities, pacing)
    #[arg(long)]
    hardened: bool,

    /// SOCKS5/HTTP proxy URL (e.g. socks5h://127.0.0.1:1080)
    #[arg(long)]
    proxy: Option<String>,

    /// Engine socket timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u32,

    /// Directory exported files are copied into (default: system downloads)
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

/// Renders monitor snapshots onto one updating terminal line.
struct TerminalSink;

impl ProgressSink for TerminalSink {
    fn update(&self, state: &DownloadState) {
        let line = match state.status {
            DownloadStatus::Starting => "Starting download...".to_string(),
            DownloadStatus::Downloading if state.total_bytes > 0 => format!(
                "Downloading {:5.1}% | {} / {} | {} | ETA {}",
                state.progress,
                format_filesize(Some(state.downloaded_bytes)),
                format_filesize(Some(state.total_bytes)),
                state.speed,
                state.eta,
            ),
            DownloadStatus::Downloading => {
                format!("Downloading {:5.1}% | {}", state.progress, state.speed)
            }
            DownloadStatus::Finished => "Download completed".to_string(),
            DownloadStatus::Error => "Download failed".to_string(),
            DownloadStatus::Idle => "Retrying with a different client identity...".to_string(),
        };
        print!("\r\x1b[K{}", line);
        let _ = io::stdout().flush();
    }
}

struct App {
    orchestrator: Orchestrator,
    session: Session,
    export_dir: PathBuf,
    current_url: Option<String>,
    metadata: Option<VideoMetadata>,
    kind: DownloadKind,
    quality: Quality,
    container: String,
    sidecars: Sidecars,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();

    let config = if args.hardened {
        EngineConfig::hardened()
    } else {
        EngineConfig::standard()
    }
    .with_proxy(args.proxy)
    .with_timeout(args.timeout);

    let engine: Arc<dyn ExtractionEngine> = Arc::new(YtDlpEngine::new());
    if !engine.is_available() {
        eprintln!("[Main] Warning: yt-dlp binary not found; downloads will fail until installed");
    }

    let export_dir = args
        .export_dir
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut app = App {
        orchestrator: Orchestrator::new(engine, config),
        session: Session::new()?,
        export_dir,
        current_url: None,
        metadata: None,
        kind: DownloadKind::VideoAudio,
        quality: Quality::Best,
        container: "mp4".to_string(),
        sidecars: Sidecars::default(),
    };

    println!("ytgrab - type 'help' for commands");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match command {
            "help" => print_help(),
            "url" => app.set_url(rest),
            "info" => app.fetch_info().await,
            "formats" => app.show_formats(),
            "kind" => app.set_kind(rest),
            "quality" => app.set_quality(rest),
            "container" => app.set_container(rest),
            "sidecars" => app.set_sidecars(rest),
            "show" => app.show_config(),
            "download" => app.download().await,
            "files" => app.list_files(),
            "export" => app.export(rest),
            "clear" => app.clear(),
            "network" => app.network_status().await,
            "quit" | "exit" => break,
            _ => println!("Unknown command '{}'; type 'help'", command),
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "Commands:\n\
         \x20 url <link>           set the video URL\n\
         \x20 info                 fetch video information\n\
         \x20 formats              list available formats\n\
         \x20 kind <video|video-only|audio>\n\
         \x20 quality <best|worst|1080p|720p|...|192k|128k|...>\n\
         \x20 container <mp4|mkv|webm|avi|mp3|aac|flac|wav|ogg>\n\
         \x20 sidecars <thumbnail,description,subtitles|none>\n\
         \x20 show                 show the current download configuration\n\
         \x20 download             start the download\n\
         \x20 files                list downloaded files\n\
         \x20 export <name>        copy a downloaded file to the export directory\n\
         \x20 clear                delete all downloaded files\n\
         \x20 network              show proxy mode and external IP\n\
         \x20 quit"
    );
}

impl App {
    fn set_url(&mut self, raw: &str) {
        if raw.is_empty() {
            println!("Usage: url <link>");
            return;
        }
        if !url::is_valid_url(raw) {
            println!("Invalid URL: not a recognized video link");
            return;
        }
        match url::extract_video_id(raw) {
            Some(id) => println!("OK - video ID {}", id),
            None => println!("OK"),
        }
        self.current_url = Some(raw.to_string());
        // Stale metadata never survives a URL change
        self.metadata = None;
    }

    async fn fetch_info(&mut self) {
        let Some(url_text) = self.current_url.clone() else {
            println!("Set a URL first: url <link>");
            return;
        };

        println!("Fetching video information...");
        match self.orchestrator.fetch_metadata(&url_text).await {
            Ok(metadata) => {
                print_metadata(&metadata);
                self.metadata = Some(metadata);
            }
            Err(e) => report_failure(&e),
        }
    }

    fn show_formats(&self) {
        let Some(metadata) = &self.metadata else {
            println!("Fetch video info first: info");
            return;
        };

        let classified = ClassifiedFormats::classify(&metadata.formats);

        println!("Video + audio ({} shown):", classified.combined_display().len());
        for fmt in classified.combined_display() {
            println!(
                "  {:>4}p @ {:>4.0}fps | {:>4} | {} | video {} / audio {}",
                fmt.height.unwrap_or(0),
                fmt.fps.unwrap_or(0.0),
                fmt.ext.to_uppercase(),
                format_filesize(fmt.effective_size()),
                fmt.vcodec.as_deref().unwrap_or("?"),
                fmt.acodec.as_deref().unwrap_or("?"),
            );
        }

        println!("Video only ({} shown):", classified.video_display().len());
        for fmt in classified.video_display() {
            println!(
                "  {:>4}p @ {:>4.0}fps | {:>4} | {} | {}",
                fmt.height.unwrap_or(0),
                fmt.fps.unwrap_or(0.0),
                fmt.ext.to_uppercase(),
                format_filesize(fmt.effective_size()),
                fmt.vcodec.as_deref().unwrap_or("?"),
            );
        }

        println!("Audio only ({} shown):", classified.audio_display().len());
        for fmt in classified.audio_display() {
            println!(
                "  {:>4.0}kbps | {:>4} | {} | {}",
                fmt.abr.unwrap_or(0.0),
                fmt.ext.to_uppercase(),
                format_filesize(fmt.effective_size()),
                fmt.acodec.as_deref().unwrap_or("?"),
            );
        }
    }

    fn set_kind(&mut self, raw: &str) {
        self.kind = match raw {
            "video" => DownloadKind::VideoAudio,
            "video-only" => DownloadKind::VideoOnly,
            "audio" => DownloadKind::AudioOnly,
            _ => {
                println!("Usage: kind <video|video-only|audio>");
                return;
            }
        };
        // Keep the container sensible for the new kind
        self.container = match self.kind {
            DownloadKind::AudioOnly => "mp3".to_string(),
            _ => "mp4".to_string(),
        };
        println!("OK");
    }

    fn set_quality(&mut self, raw: &str) {
        match Quality::parse(raw) {
            Some(q) => {
                self.quality = q;
                println!("OK");
            }
            None => println!("Usage: quality <best|worst|1080p|192k|...>"),
        }
    }

    fn set_container(&mut self, raw: &str) {
        const VIDEO: [&str; 4] = ["mp4", "mkv", "webm", "avi"];
        const AUDIO: [&str; 6] = ["mp3", "aac", "m4a", "flac", "wav", "ogg"];
        let allowed: &[&str] = match self.kind {
            DownloadKind::AudioOnly => &AUDIO,
            _ => &VIDEO,
        };
        if allowed.contains(&raw) {
            self.container = raw.to_string();
            println!("OK");
        } else {
            println!("Container '{}' does not fit the current kind; one of {:?}", raw, allowed);
        }
    }

    fn set_sidecars(&mut self, raw: &str) {
        if raw == "none" {
            self.sidecars = Sidecars::default();
            println!("OK");
            return;
        }
        let mut sidecars = Sidecars::default();
        for part in raw.split(',').map(str::trim) {
            match part {
                "thumbnail" => sidecars.thumbnail = true,
                "description" => sidecars.description = true,
                "subtitles" => sidecars.subtitles = true,
                _ => {
                    println!("Usage: sidecars <thumbnail,description,subtitles|none>");
                    return;
                }
            }
        }
        if sidecars.subtitles {
            println!("Note: subtitles may trigger rate limiting (HTTP 429)");
        }
        self.sidecars = sidecars;
        println!("OK");
    }

    fn show_config(&self) {
        println!(
            "url: {}\nkind: {:?}\nquality: {}\ncontainer: {}\nsidecars: thumbnail={} description={} subtitles={}",
            self.current_url.as_deref().unwrap_or("(unset)"),
            self.kind,
            self.quality,
            self.container,
            self.sidecars.thumbnail,
            self.sidecars.description,
            self.sidecars.subtitles,
        );
    }

    fn request(&self, url_text: &str) -> DownloadRequest {
        DownloadRequest {
            url: url_text.to_string(),
            kind: self.kind,
            quality: self.quality,
            container: self.container.clone(),
            sidecars: self.sidecars,
        }
    }

    async fn download(&mut self) {
        let Some(url_text) = self.current_url.clone() else {
            println!("Set a URL first: url <link>");
            return;
        };
        let request = self.request(&url_text);
        self.run_download(request).await;
    }

    async fn run_download(&mut self, request: DownloadRequest) {
        let outcome = self
            .orchestrator
            .download(&request, self.session.dir(), &TerminalSink)
            .await;
        println!();

        match outcome.result {
            Ok(()) => {
                if outcome.attempts > 1 {
                    println!("Succeeded after {} attempts", outcome.attempts);
                }
                self.list_files();
            }
            Err(e) => {
                report_failure(&e);
                let remediation = advise_error(&e);
                if remediation.category.offers_audio_fallback()
                    || remediation.category.offers_low_quality_fallback()
                {
                    self.offer_fallbacks(&request, remediation.category).await;
                }
            }
        }
    }

    async fn offer_fallbacks(&mut self, request: &DownloadRequest, category: ErrorCategory) {
        let audio = category.offers_audio_fallback();
        let low = category.offers_low_quality_fallback();
        match (audio, low) {
            (true, true) => println!("Quick fixes: [a]udio only, [l]owest quality, [n]o"),
            (true, false) => println!("Quick fixes: [a]udio only, [n]o"),
            (false, true) => println!("Quick fixes: [l]owest quality, [n]o"),
            (false, false) => return,
        }
        print!("> ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return;
        }
        match answer.trim() {
            "a" if audio => {
                println!("Trying audio-only download...");
                Box::pin(self.run_download(request.audio_fallback())).await;
            }
            "l" if low => {
                println!("Trying lowest quality download...");
                Box::pin(self.run_download(request.lowest_quality_fallback())).await;
            }
            _ => {}
        }
    }

    fn list_files(&self) {
        let files = self.session.list_files();
        if files.is_empty() {
            println!("No downloaded files");
            return;
        }
        println!(
            "{} files, total {}",
            files.len(),
            format_filesize(Some(self.session.total_size()))
        );
        for file in files {
            println!(
                "  [{}] {} ({})",
                file.kind.tag(),
                file.name(),
                format_filesize(Some(file.size))
            );
        }
    }

    fn export(&self, name: &str) {
        if name.is_empty() {
            println!("Usage: export <file name from 'files'>");
            return;
        }
        match self.session.export(name, &self.export_dir) {
            Ok(dest) => println!("Exported to {}", dest.display()),
            Err(e) => println!("Export failed: {}", e),
        }
    }

    fn clear(&mut self) {
        match self.session.clear() {
            Ok(()) => println!("Downloads cleared"),
            Err(e) => println!("Clear failed: {}", e),
        }
    }

    async fn network_status(&self) {
        let status = get_network_status_info(self.orchestrator.config().proxy.clone()).await;
        println!(
            "mode: {} | proxy: {} | external IP: {}",
            status.mode,
            status.proxy.as_deref().unwrap_or("(none)"),
            status.external_ip.as_deref().unwrap_or("unknown"),
        );
    }
}

fn print_metadata(metadata: &VideoMetadata) {
    println!("Title:    {}", metadata.title);
    println!("Channel:  {}", metadata.uploader);
    println!("Duration: {}", format_duration(metadata.duration));
    println!("Views:    {}", format_number(metadata.view_count));
    if let Some(date) = &metadata.upload_date {
        println!("Uploaded: {}", format_upload_date(date));
    }
    println!("Video ID: {}", metadata.id);
    if let Some(availability) = &metadata.availability {
        println!("Availability: {}", availability);
    }
    if metadata.age_limit > 0 {
        println!("Age limit: {}+", metadata.age_limit);
    }
    if !metadata.description.is_empty() {
        let first_line = metadata.description.lines().next().unwrap_or("");
        println!("Description: {}", first_line);
    }
}

fn report_failure(error: &DownloadError) {
    let remediation = advise_error(error);
    println!("{}: {}", remediation.category.headline(), error);
    if let Some(diagnostic) = error.diagnostic() {
        for line in diagnostic.lines().take(4) {
            println!("  | {}", line);
        }
    }
    println!("Suggestions:");
    for suggestion in &remediation.suggestions {
        println!("  - {}", suggestion);
    }
}
