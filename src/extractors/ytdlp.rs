use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::hook;
use super::{resolve_output_path, FetchedMedia, FormatPreference, MediaExtractor};
use crate::progress::ProgressSink;
use crate::{DownloaderError, Result};

const DEFAULT_TITLE: &str = "Video";
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Media extractor driving the yt-dlp executable
pub struct YtDlpExtractor {
    yt_dlp_path: String,
}

/// Subset of the info JSON printed by `--dump-json`
#[derive(Debug, Deserialize)]
struct VideoMetadata {
    title: Option<String>,
    #[serde(rename = "_filename")]
    prepared_filename: Option<String>,
    filename: Option<String>,
}

impl VideoMetadata {
    fn predicted_path(&self, output_dir: &Path) -> Option<PathBuf> {
        let name = self.prepared_filename.as_ref().or(self.filename.as_ref())?;
        let path = PathBuf::from(name);
        if path.is_absolute() {
            Some(path)
        } else {
            Some(output_dir.join(path.file_name()?))
        }
    }
}

enum StreamLine {
    Stdout(String),
    Stderr(String),
}

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self::with_path("yt-dlp")
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: path.into(),
        }
    }

    fn build_args(&self, url: &str, output_dir: &Path, format: FormatPreference) -> Vec<String> {
        vec![
            "--format".to_string(),
            format.format_selector().to_string(),
            "--output".to_string(),
            output_dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--geo-bypass".to_string(),
            // Print the info JSON and still download
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            // --dump-json implies --quiet, which would hide progress
            "--progress".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            hook::progress_template(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn fetch(
        &self,
        url: &str,
        output_dir: &Path,
        format: FormatPreference,
        sink: &mut dyn ProgressSink,
    ) -> Result<FetchedMedia> {
        tracing::debug!("Fetching {} ({}) into {}", url, format, output_dir.display());

        let mut child = Command::new(&self.yt_dlp_path)
            .args(self.build_args(url, output_dir, format))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DownloaderError::Extraction(format!("Failed to start {}: {}", self.yt_dlp_path, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloaderError::Extraction("Failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloaderError::Extraction("Failed to capture yt-dlp stderr".to_string()))?;

        // Progress may arrive on either stream depending on yt-dlp's quiet mode
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = forward_lines(stdout, tx.clone(), StreamLine::Stdout);
        let stderr_task = forward_lines(stderr, tx, StreamLine::Stderr);

        let mut metadata: Option<VideoMetadata> = None;
        let mut diagnostics: Vec<String> = Vec::new();

        while let Some(line) = rx.recv().await {
            let text = match &line {
                StreamLine::Stdout(text) | StreamLine::Stderr(text) => text,
            };

            if let Some(progress) = hook::parse_line(text) {
                hook::report(&progress, sink);
                continue;
            }

            match line {
                StreamLine::Stdout(text) if text.trim_start().starts_with('{') => {
                    match serde_json::from_str::<VideoMetadata>(&text) {
                        Ok(info) => metadata = Some(info),
                        Err(e) => tracing::debug!("Ignoring unparseable yt-dlp JSON: {}", e),
                    }
                }
                StreamLine::Stdout(text) => tracing::debug!("yt-dlp: {}", text),
                StreamLine::Stderr(text) => {
                    tracing::debug!("yt-dlp: {}", text);
                    diagnostics.push(text);
                }
            }
        }

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let status = child
            .wait()
            .await
            .map_err(|e| DownloaderError::Extraction(format!("yt-dlp process failed: {}", e)))?;

        if !status.success() {
            let detail = diagnostics.join("\n");
            return Err(DownloaderError::Extraction(format!(
                "yt-dlp exited with {}: {}",
                status,
                detail.trim()
            ))
            .into());
        }

        let metadata = metadata.ok_or_else(|| {
            DownloaderError::Extraction("yt-dlp did not report any video metadata".to_string())
        })?;
        let predicted = metadata.predicted_path(output_dir).ok_or_else(|| {
            DownloaderError::Extraction("yt-dlp did not report an output filename".to_string())
        })?;

        let path = match resolve_output_path(&predicted, output_dir)? {
            Some(found) => {
                if found != predicted {
                    tracing::info!(
                        "Predicted file {} missing, using {}",
                        predicted.display(),
                        found.display()
                    );
                }
                found
            }
            // Left for the session's existence check to report
            None => predicted,
        };

        let title = metadata
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(FetchedMedia { path, title })
    }

    fn backend_name(&self) -> &'static str {
        "yt-dlp"
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn forward_lines<R>(
    reader: R,
    tx: mpsc::UnboundedSender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c: char| c == '\r' || c == '\n')
                        .to_string();
                    if tx.send(wrap(line)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let extractor = YtDlpExtractor::new();
        let args = extractor.build_args(
            "https://www.youtube.com/watch?v=abc",
            Path::new("/tmp/scratch"),
            FormatPreference::Video,
        );

        assert_eq!(args[0], "--format");
        assert_eq!(args[1], FormatPreference::Video.format_selector());
        assert_eq!(args[3], "/tmp/scratch/%(title)s.%(ext)s");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--geo-bypass".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_predicted_path_prefers_prepared_filename() {
        let metadata: VideoMetadata = serde_json::from_str(
            r#"{"title": "Clip", "_filename": "/tmp/x/Clip.webm", "filename": "/tmp/x/Other.webm"}"#,
        )
        .unwrap();
        assert_eq!(
            metadata.predicted_path(Path::new("/tmp/x")),
            Some(PathBuf::from("/tmp/x/Clip.webm"))
        );
    }

    #[test]
    fn test_relative_prediction_is_placed_in_output_dir() {
        let metadata: VideoMetadata =
            serde_json::from_str(r#"{"title": "Clip", "filename": "Clip.mp4"}"#).unwrap();
        assert_eq!(
            metadata.predicted_path(Path::new("/tmp/x")),
            Some(PathBuf::from("/tmp/x/Clip.mp4"))
        );
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::progress::ProgressState;
        use crate::utils::testing::{write_script, RecordingSink};

        const FAKE_YT_DLP: &str = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
dir=$(dirname "$out")
printf '[tubegrab-progress]downloading|\033[0;94m 50.0%%\033[0m|NA|NA|NA|\033[0;32m1.00MiB/s\033[0m|00:01\n' >&2
echo "{\"title\": \"Clip\", \"_filename\": \"$dir/Clip.mp4\"}"
printf 'data' > "$dir/Clip.mkv"
printf '[tubegrab-progress]finished|100%%|4|4|NA|NA|NA\n' >&2
"#;

        #[tokio::test]
        async fn test_fetch_adopts_file_with_other_extension() {
            let tools = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let script = write_script(tools.path(), "yt-dlp", FAKE_YT_DLP);

            let extractor = YtDlpExtractor::with_path(script.to_string_lossy());
            let mut sink = RecordingSink::default();
            let fetched = extractor
                .fetch(
                    "https://www.youtube.com/watch?v=abc",
                    scratch.path(),
                    FormatPreference::Video,
                    &mut sink,
                )
                .await
                .unwrap();

            assert_eq!(fetched.title, "Clip");
            assert_eq!(fetched.path, scratch.path().join("Clip.mkv"));
            assert_eq!(
                sink.updates,
                vec![
                    (0.5, "Downloading: 50.0% | Speed: 1.00MiB/s | ETA: 00:01".to_string()),
                    (1.0, hook::FINISHED_MESSAGE.to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn test_fetch_reports_tool_diagnostics() {
            let tools = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let script = write_script(
                tools.path(),
                "yt-dlp",
                "echo 'ERROR: Unsupported URL: https://example.com/nothing' >&2\nexit 1\n",
            );

            let extractor = YtDlpExtractor::with_path(script.to_string_lossy());
            let mut sink = ProgressState::new();
            let err = extractor
                .fetch("https://example.com/nothing", scratch.path(), FormatPreference::Wav, &mut sink)
                .await
                .unwrap_err();

            match DownloaderError::from_anyhow(&err) {
                Some(DownloaderError::Extraction(message)) => {
                    assert!(message.contains("Unsupported URL"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_fetch_fails_when_tool_is_missing() {
            let scratch = tempfile::tempdir().unwrap();
            let extractor = YtDlpExtractor::with_path("/nonexistent/yt-dlp");
            let mut sink = ProgressState::new();
            let err = extractor
                .fetch("https://example.com/v", scratch.path(), FormatPreference::Video, &mut sink)
                .await
                .unwrap_err();

            assert!(matches!(
                DownloaderError::from_anyhow(&err),
                Some(DownloaderError::Extraction(_))
            ));
        }
    }
}
