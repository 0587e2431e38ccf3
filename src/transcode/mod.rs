use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::progress::ProgressSink;
use crate::{DownloaderError, Result};

/// Sample rate of the normalized WAV output
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Channel count of the normalized WAV output
pub const CHANNELS: u8 = 1;

pub const CONVERTING_MESSAGE: &str = "Extracting audio to WAV...";
pub const CONVERTED_MESSAGE: &str = "Conversion complete!";

/// Trait for converting a media file to normalized WAV
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Convert `input` into `<output_dir>/<input stem>.wav` and return that path
    async fn to_wav(
        &self,
        input: &Path,
        output_dir: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<PathBuf>;
}

/// Transcoder shelling out to ffmpeg
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::with_path("ffmpeg")
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    /// Target path for the converted file
    pub fn wav_path(input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .ok_or_else(|| DownloaderError::MissingInputFile(input.to_path_buf()))?;
        let mut name = stem.to_os_string();
        name.push(".wav");
        Ok(output_dir.join(name))
    }

    fn build_args(input: &Path, wav_path: &Path) -> Vec<String> {
        let sample_rate = SAMPLE_RATE_HZ.to_string();
        let channels = CHANNELS.to_string();
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            sample_rate,
            "-ac".to_string(),
            channels,
            wav_path.to_string_lossy().into_owned(),
        ]
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn to_wav(
        &self,
        input: &Path,
        output_dir: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<PathBuf> {
        if !input.is_file() {
            return Err(DownloaderError::MissingInputFile(input.to_path_buf()).into());
        }

        fs_err::create_dir_all(output_dir)?;
        let wav_path = Self::wav_path(input, output_dir)?;

        sink.set(0.5, CONVERTING_MESSAGE);
        tracing::debug!("Converting {} to {}", input.display(), wav_path.display());

        let output = Command::new(&self.ffmpeg_path)
            .args(Self::build_args(input, &wav_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DownloaderError::TranscodeTool(format!("Failed to start {}: {}", self.ffmpeg_path, e))
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(DownloaderError::TranscodeTool(format!(
                "{} exited with {}: {}",
                self.ffmpeg_path,
                output.status,
                error.trim()
            ))
            .into());
        }

        sink.set(1.0, CONVERTED_MESSAGE);
        Ok(wav_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MockProgressSink;

    #[test]
    fn test_build_args_match_normalized_format() {
        let args = FfmpegTranscoder::build_args(Path::new("/tmp/in.webm"), Path::new("/tmp/out/in.wav"));
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/tmp/in.webm", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1",
                "/tmp/out/in.wav",
            ]
        );
    }

    #[test]
    fn test_wav_path_replaces_extension() {
        let path = FfmpegTranscoder::wav_path(Path::new("/tmp/a/My Clip.m4a"), Path::new("/tmp/b")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/b/My Clip.wav"));
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        // The tool does not exist either, so a spawn attempt would yield TranscodeTool
        let transcoder = FfmpegTranscoder::with_path("/nonexistent/ffmpeg");
        let mut sink = MockProgressSink::new();
        sink.expect_set().times(0);

        let err = transcoder
            .to_wav(&dir.path().join("missing.webm"), dir.path(), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(
            DownloaderError::from_anyhow(&err),
            Some(DownloaderError::MissingInputFile(_))
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::utils::testing::{write_script, RecordingSink};

        #[tokio::test]
        async fn test_converts_and_reports_milestones() {
            let tools = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            // Record the arguments and create the last one as the output file
            let record = scratch.path().join("ffmpeg-args.txt");
            let script = write_script(
                tools.path(),
                "ffmpeg",
                &format!(
                    "echo \"$@\" > '{}'\nfor last in \"$@\"; do :; done\nprintf 'RIFF' > \"$last\"\n",
                    record.display()
                ),
            );
            let input = scratch.path().join("Clip.webm");
            fs_err::write(&input, b"media").unwrap();

            let transcoder = FfmpegTranscoder::with_path(script.to_string_lossy());
            let mut sink = RecordingSink::default();
            let wav = transcoder
                .to_wav(&input, &scratch.path().join("out"), &mut sink)
                .await
                .unwrap();

            assert_eq!(wav, scratch.path().join("out").join("Clip.wav"));
            assert!(wav.is_file());
            let args = fs_err::read_to_string(&record).unwrap();
            assert!(args.contains("-acodec pcm_s16le -ar 16000 -ac 1"));
            assert_eq!(
                sink.updates,
                vec![
                    (0.5, CONVERTING_MESSAGE.to_string()),
                    (1.0, CONVERTED_MESSAGE.to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn test_non_zero_exit_carries_diagnostics() {
            let tools = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let script = write_script(
                tools.path(),
                "ffmpeg",
                "echo 'Invalid data found when processing input' >&2\nexit 1\n",
            );
            let input = scratch.path().join("Clip.webm");
            fs_err::write(&input, b"not media").unwrap();

            let transcoder = FfmpegTranscoder::with_path(script.to_string_lossy());
            let mut sink = RecordingSink::default();
            let err = transcoder.to_wav(&input, scratch.path(), &mut sink).await.unwrap_err();

            match DownloaderError::from_anyhow(&err) {
                Some(DownloaderError::TranscodeTool(message)) => {
                    assert!(message.contains("Invalid data found when processing input"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(sink.updates, vec![(0.5, CONVERTING_MESSAGE.to_string())]);
        }
    }
}
