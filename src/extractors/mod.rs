use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod hook;
pub mod ytdlp;

use crate::progress::ProgressSink;
use crate::{DownloaderError, Result};

/// Output format requested by the user
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatPreference {
    /// Best MP4 video muxed with the best M4A audio
    Video,
    /// Best audio track, converted to 16 kHz mono PCM WAV
    Wav,
}

impl FormatPreference {
    /// yt-dlp format selector for this preference
    pub fn format_selector(&self) -> &'static str {
        match self {
            FormatPreference::Video => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            FormatPreference::Wav => "bestaudio/best",
        }
    }

    /// Whether the fetched file still has to go through the transcoder
    pub fn needs_transcode(&self) -> bool {
        matches!(self, FormatPreference::Wav)
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            FormatPreference::Video => MediaKind::Video,
            FormatPreference::Wav => MediaKind::Audio,
        }
    }
}

impl std::fmt::Display for FormatPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatPreference::Video => write!(f, "video"),
            FormatPreference::Wav => write!(f, "wav"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// One user-initiated download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    format: FormatPreference,
}

impl DownloadRequest {
    /// Build a request, rejecting blank or non-HTTP(S) URLs
    pub fn new(url: &str, format: FormatPreference) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloaderError::InvalidInput("URL must not be empty".to_string()).into());
        }

        let normalized = crate::utils::validate_and_normalize_url(url)
            .map_err(|e| DownloaderError::InvalidInput(e.to_string()))?;

        Ok(Self {
            url: normalized,
            format,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> FormatPreference {
        self.format
    }
}

/// A finished media file inside a request's scratch directory
#[derive(Debug, Clone, PartialEq)]
pub struct MediaArtifact {
    /// Absolute path of the file
    pub path: PathBuf,

    /// Title reported by the site
    pub title: String,

    pub kind: MediaKind,
}

impl MediaArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.title.clone())
    }
}

/// File and title produced by an extractor
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub path: PathBuf,
    pub title: String,
}

/// Trait for fetching media from a URL into a local directory
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download the single item behind `url` into `output_dir`, reporting progress to `sink`
    async fn fetch(
        &self,
        url: &str,
        output_dir: &Path,
        format: FormatPreference,
        sink: &mut dyn ProgressSink,
    ) -> Result<FetchedMedia>;

    /// Get the name of this backend
    fn backend_name(&self) -> &'static str;
}

/// Locate the file a download actually produced.
///
/// The predicted name is used when it exists. Otherwise the container often
/// differs from the prediction, so the first directory entry whose name starts
/// with the predicted base name (extension stripped) is adopted.
pub fn resolve_output_path(predicted: &Path, output_dir: &Path) -> Result<Option<PathBuf>> {
    if predicted.is_file() {
        return Ok(Some(predicted.to_path_buf()));
    }

    let stem = match predicted.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => return Ok(None),
    };

    let mut names: Vec<String> = fs_err::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(&stem))
        .collect();
    // read_dir order is platform dependent
    names.sort();

    Ok(names.into_iter().next().map(|name| output_dir.join(name)))
}
