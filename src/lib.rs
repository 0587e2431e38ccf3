//! Tubegrab - A Rust CLI tool for downloading online videos
//!
//! This library fetches a single video (or its best audio track) through yt-dlp,
//! optionally normalizes the audio to 16 kHz mono PCM WAV with ffmpeg, and hands
//! the finished file back as a self-contained data URL.

use std::path::PathBuf;

pub mod cli;
pub mod config;
pub mod delivery;
pub mod extractors;
pub mod output;
pub mod progress;
pub mod session;
pub mod transcode;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use delivery::DeliveryLink;
pub use extractors::{DownloadRequest, FormatPreference, MediaArtifact, MediaExtractor, MediaKind};
pub use progress::{BarSink, ProgressSink, ProgressState};
pub use session::{Outcome, RequestState, Session};
pub use transcode::{AudioTranscoder, FfmpegTranscoder};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the downloader
#[derive(thiserror::Error, Debug)]
pub enum DownloaderError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Download failed: {0}")]
    Extraction(String),

    #[error("[FFmpeg] Input file not found: {}", .0.display())]
    MissingInputFile(PathBuf),

    #[error("FFmpeg error: {0}")]
    TranscodeTool(String),

    #[error("The file {} was not found after the download", .0.display())]
    OutputMissing(PathBuf),

    #[error("Failed to read {} for delivery: {source}", path.display())]
    DeliveryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloaderError {
    /// Borrow the downloader error behind an `anyhow::Error`, if there is one
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&Self> {
        err.downcast_ref::<Self>()
    }
}
