// Per-session working directory and downloaded-file listing

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;

/// Rough file type, derived from the extension, for listing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Audio,
    Image,
    Subtitle,
    Other,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "mkv" | "webm" | "avi" => Self::Video,
            "mp3" | "aac" | "m4a" | "flac" | "wav" | "ogg" | "opus" => Self::Audio,
            "jpg" | "jpeg" | "png" | "webp" => Self::Image,
            "vtt" | "srt" => Self::Subtitle,
            _ => Self::Other,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Subtitle => "subs",
            Self::Other => "file",
        }
    }
}

/// One entry in the session directory listing.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub kind: FileKind,
}

impl DownloadedFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Process-private working directory for one user session.
///
/// Created at orchestrator start, removed best-effort on drop, recreated
/// on explicit clear. Each session owns its own directory, so no
/// cross-session locking is needed.
pub struct Session {
    temp_dir: TempDir,
}

impl Session {
    pub fn new() -> io::Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("ytgrab_").tempdir()?;
        eprintln!("[Session] Working directory: {}", temp_dir.path().display());
        Ok(Self { temp_dir })
    }

    /// Directory downloads land in.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Non-empty regular files, newest first.
    pub fn list_files(&self) -> Vec<DownloadedFile> {
        let mut files = Vec::new();

        let entries = match fs::read_dir(self.dir()) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("[Session] Failed to read directory: {}", e);
                return files;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() || meta.len() == 0 {
                continue;
            }
            files.push(DownloadedFile {
                kind: FileKind::from_path(&path),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        files
    }

    pub fn total_size(&self) -> u64 {
        self.list_files().iter().map(|f| f.size).sum()
    }

    /// Drop every downloaded file and start over with a fresh directory.
    pub fn clear(&mut self) -> io::Result<()> {
        let fresh = tempfile::Builder::new().prefix("ytgrab_").tempdir()?;
        let old = std::mem::replace(&mut self.temp_dir, fresh);
        // Removal of the old directory is best-effort
        if let Err(e) = old.close() {
            eprintln!("[Session] Cleanup failed (ignored): {}", e);
        }
        Ok(())
    }

    /// Copy a downloaded file out of the session sandbox.
    pub fn export(&self, file_name: &str, dest_dir: &Path) -> io::Result<PathBuf> {
        let source = self.dir().join(file_name);
        if !source.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such downloaded file: {}", file_name),
            ));
        }
        fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(file_name);
        fs::copy(&source, &dest)?;
        Ok(dest)
    }
}
