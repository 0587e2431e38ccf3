//! Progress events reported by yt-dlp and their mapping onto a [`ProgressSink`].
//!
//! yt-dlp is asked to print one line per progress callback through
//! `--progress-template`. Every line starts with [`PROGRESS_MARKER`] followed by
//! `|`-separated fields; unavailable fields are printed as `NA`.

use crate::progress::ProgressSink;

/// Prefix identifying progress lines among the rest of yt-dlp's output
pub const PROGRESS_MARKER: &str = "[tubegrab-progress]";

const FIELD_COUNT: usize = 7;

pub const FINISHED_MESSAGE: &str = "Download complete. Processing file...";
pub const FALLBACK_MESSAGE: &str = "Downloading...";
const FALLBACK_FRACTION: f64 = 0.5;

/// Build the value for yt-dlp's `--progress-template` option
pub fn progress_template() -> String {
    format!(
        "download:{}%(progress.status)s|%(progress._percent_str)s|%(progress.downloaded_bytes)s|\
         %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress._speed_str)s|\
         %(progress._eta_str)s",
        PROGRESS_MARKER
    )
}

/// Status reported with a progress callback
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    Downloading,
    Finished,
    Other(String),
}

/// One progress callback from the downloader
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadEvent {
    pub status: Option<DownloadStatus>,
    pub percent_str: Option<String>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    pub speed_str: Option<String>,
    pub eta_str: Option<String>,
}

/// Outcome of interpreting one progress line
#[derive(Debug, Clone, PartialEq)]
pub enum HookLine {
    /// Well-formed progress event
    Event(DownloadEvent),
    /// Marked as progress but could not be parsed
    Malformed(String),
}

/// Parse a line of yt-dlp output; `None` if it is not a progress line
pub fn parse_line(line: &str) -> Option<HookLine> {
    let body = line.trim().strip_prefix(PROGRESS_MARKER)?;

    let fields: Vec<&str> = body.split('|').collect();
    if fields.len() != FIELD_COUNT {
        return Some(HookLine::Malformed(body.to_string()));
    }

    let status = match available(fields[0]) {
        Some(s) if s == "downloading" => Some(DownloadStatus::Downloading),
        Some(s) if s == "finished" => Some(DownloadStatus::Finished),
        Some(s) => Some(DownloadStatus::Other(s)),
        None => None,
    };

    Some(HookLine::Event(DownloadEvent {
        status,
        percent_str: available(fields[1]),
        downloaded_bytes: parse_bytes(fields[2]),
        total_bytes: parse_bytes(fields[3]),
        total_bytes_estimate: parse_bytes(fields[4]),
        speed_str: available(fields[5]),
        eta_str: available(fields[6]),
    }))
}

fn available(field: &str) -> Option<String> {
    let field = field.trim();
    if field.is_empty() || field == "NA" || field == "None" {
        None
    } else {
        Some(field.to_string())
    }
}

// Byte counters may be printed as floats ("1024.0") by some downloaders
fn parse_bytes(field: &str) -> Option<u64> {
    let field = available(field)?;
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

/// Remove terminal color/control sequences
pub fn strip_terminal_codes(text: &str) -> String {
    console::strip_ansi_codes(text).into_owned()
}

/// Pull the first number out of a percentage string such as `"\x1b[0;94m 42.5%\x1b[0m"`.
///
/// Returns 0.0 when no number is present.
pub fn extract_percentage(percent_str: &str) -> f64 {
    let clean = strip_terminal_codes(percent_str);
    let start = match clean.find(|c: char| c.is_ascii_digit()) {
        Some(start) => start,
        None => return 0.0,
    };

    let rest = &clean[start..];
    let mut end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let mut number = &rest[..end];

    // Keep at most one decimal point, and only if digits follow it
    if let Some(dot) = number.find('.') {
        let fraction_digits = number[dot + 1..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(number.len() - dot - 1);
        end = if fraction_digits == 0 { dot } else { dot + 1 + fraction_digits };
        number = &rest[..end];
    }

    number.parse::<f64>().unwrap_or(0.0)
}

/// Fraction in `[0.0, 1.0]` from byte counters; 0.0 when the total is unknown or zero
pub fn fraction_from_bytes(downloaded: Option<u64>, total: Option<u64>) -> f64 {
    match (downloaded, total) {
        (Some(done), Some(total)) if total > 0 => (done as f64 / total as f64).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

impl DownloadEvent {
    /// Percentage complete, preferring the formatted string over byte counters
    pub fn percentage(&self) -> f64 {
        if let Some(percent) = &self.percent_str {
            return extract_percentage(percent);
        }

        let total = self.total_bytes.or(self.total_bytes_estimate);
        fraction_from_bytes(self.downloaded_bytes, total) * 100.0
    }

    /// Status line shown while downloading
    pub fn message(&self) -> String {
        let speed = self
            .speed_str
            .as_deref()
            .map(strip_terminal_codes)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let eta = self
            .eta_str
            .as_deref()
            .map(strip_terminal_codes)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "Downloading: {:.1}% | Speed: {} | ETA: {}",
            self.percentage(),
            speed,
            eta
        )
    }
}

/// Forward one parsed line to the sink.
///
/// Never fails: malformed progress only degrades the display to a neutral 50%.
pub fn report(line: &HookLine, sink: &mut dyn ProgressSink) {
    match line {
        HookLine::Event(event) => match &event.status {
            Some(DownloadStatus::Downloading) => {
                let fraction = (event.percentage() / 100.0).min(1.0);
                sink.set(fraction, &event.message());
            }
            Some(DownloadStatus::Finished) => sink.set(1.0, FINISHED_MESSAGE),
            Some(DownloadStatus::Other(status)) => {
                tracing::debug!("Ignoring progress status: {}", status);
            }
            None => {
                tracing::debug!("Progress event without status");
                sink.set(FALLBACK_FRACTION, FALLBACK_MESSAGE);
            }
        },
        HookLine::Malformed(raw) => {
            tracing::debug!("Unparseable progress line: {}", raw);
            sink.set(FALLBACK_FRACTION, FALLBACK_MESSAGE);
        }
    }
}
