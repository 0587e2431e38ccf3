use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Config;
use crate::extractors::ytdlp::YtDlpExtractor;
use crate::extractors::{DownloadRequest, MediaArtifact, MediaExtractor};
use crate::progress::ProgressSink;
use crate::transcode::{AudioTranscoder, FfmpegTranscoder};
use crate::{DownloaderError, Result};

/// Lifecycle of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Extracting,
    Converting,
    Verifying,
    Ready,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Ready | RequestState::Failed)
    }
}

/// Request-scoped temporary directory, removed on drop unless kept
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    guard: Option<TempDir>,
}

impl ScratchDir {
    /// Create a fresh directory under `base`, or the system temp dir
    pub fn create(base: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tubegrab-");

        let dir = match base {
            Some(base) => {
                fs_err::create_dir_all(base)?;
                builder.tempdir_in(base)
            }
            None => builder.tempdir(),
        }
        .context("Failed to create scratch directory")?;

        Ok(Self {
            path: dir.path().to_path_buf(),
            guard: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the directory on disk once this value is dropped
    pub fn keep(&mut self) -> &Path {
        if let Some(dir) = self.guard.take() {
            let _ = dir.keep();
        }
        &self.path
    }
}

/// A request that reached `Ready`
#[derive(Debug)]
pub struct Outcome {
    pub artifact: MediaArtifact,
    pub completed_at: DateTime<Utc>,
    scratch: ScratchDir,
}

impl Outcome {
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Keep the scratch directory (and the artifact in it) after this outcome is gone
    pub fn keep_scratch(&mut self) -> &Path {
        self.scratch.keep()
    }
}

/// Drives one download at a time from URL to a verified file on disk
pub struct Session {
    extractor: Box<dyn MediaExtractor>,
    transcoder: Box<dyn AudioTranscoder>,
    temp_base: Option<PathBuf>,
    keep_failed_scratch: bool,
    state: RequestState,
}

impl Session {
    pub fn new(extractor: Box<dyn MediaExtractor>, transcoder: Box<dyn AudioTranscoder>) -> Self {
        Self {
            extractor,
            transcoder,
            temp_base: None,
            keep_failed_scratch: false,
            state: RequestState::Idle,
        }
    }

    /// Build a session using the configured external tools
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Box::new(YtDlpExtractor::with_path(config.tools.yt_dlp.clone())),
            Box::new(FfmpegTranscoder::with_path(config.tools.ffmpeg.clone())),
        )
        .with_temp_dir(config.app.temp_dir.clone())
        .keep_failed_scratch(config.app.keep_scratch)
    }

    /// Create scratch directories under `base` instead of the system temp dir
    pub fn with_temp_dir(mut self, base: Option<PathBuf>) -> Self {
        self.temp_base = base;
        self
    }

    /// Leave the scratch directory of a failed request on disk for inspection
    pub fn keep_failed_scratch(mut self, keep: bool) -> Self {
        self.keep_failed_scratch = keep;
        self
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    fn transition(&mut self, next: RequestState) {
        tracing::debug!("Request state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Process one request. Any earlier terminal state is discarded.
    pub async fn run(&mut self, request: &DownloadRequest, sink: &mut dyn ProgressSink) -> Result<Outcome> {
        self.transition(RequestState::Idle);
        tracing::info!(
            "Processing URL: {} ({} via {})",
            request.url(),
            request.format(),
            self.extractor.backend_name()
        );

        let mut scratch = match ScratchDir::create(self.temp_base.as_deref()) {
            Ok(scratch) => scratch,
            Err(e) => {
                self.transition(RequestState::Failed);
                return Err(e);
            }
        };
        tracing::debug!("Scratch directory: {}", scratch.path().display());

        match self.execute(request, &scratch, sink).await {
            Ok(artifact) => {
                self.transition(RequestState::Ready);
                tracing::info!("Ready: \"{}\" at {}", artifact.title, artifact.path.display());
                Ok(Outcome {
                    artifact,
                    completed_at: Utc::now(),
                    scratch,
                })
            }
            Err(e) => {
                self.transition(RequestState::Failed);
                tracing::error!("Request failed: {:#}", e);
                if self.keep_failed_scratch {
                    tracing::info!("Kept scratch directory {}", scratch.keep().display());
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &mut self,
        request: &DownloadRequest,
        scratch: &ScratchDir,
        sink: &mut dyn ProgressSink,
    ) -> Result<MediaArtifact> {
        self.transition(RequestState::Extracting);
        let fetched = self
            .extractor
            .fetch(request.url(), scratch.path(), request.format(), sink)
            .await?;

        let path = if request.format().needs_transcode() {
            self.transition(RequestState::Converting);
            self.transcoder.to_wav(&fetched.path, scratch.path(), sink).await?
        } else {
            fetched.path
        };

        self.transition(RequestState::Verifying);
        if !path.is_file() {
            return Err(DownloaderError::OutputMissing(path).into());
        }

        Ok(MediaArtifact {
            path,
            title: fetched.title,
            kind: request.format().media_kind(),
        })
    }
}
