use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::extractors::FormatPreference;

#[derive(Parser)]
#[command(
    name = "tubegrab",
    about = "Tubegrab - Download videos or extract WAV audio from YouTube and other sites",
    version,
    long_about = "Download a single video as MP4 or extract its audio as 16 kHz mono WAV.\n\n\
        1. Pass the video URL to `tubegrab download`\n\
        2. Pick the format with --format (video or wav)\n\
        3. Wait for the progress bar to finish\n\
        4. Find the file in the output directory, or open the page written with --html"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a video or its audio track
    Download {
        /// Video URL (playlists yield only the referenced video)
        #[arg(value_name = "URL")]
        url: String,

        /// Output format (defaults to the configured format)
        #[arg(short, long, value_enum)]
        format: Option<FormatPreference>,

        /// Directory the finished file is copied into
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Write a self-contained HTML page with the player and download link
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,

        /// Keep the scratch directory instead of deleting it
        #[arg(long)]
        keep_scratch: bool,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },

    /// Check that yt-dlp and ffmpeg are available
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "tubegrab",
            "download",
            "https://youtu.be/abc",
            "--format",
            "wav",
            "--html",
            "page.html",
        ])
        .unwrap();

        match cli.command {
            Commands::Download { url, format, html, keep_scratch, .. } => {
                assert_eq!(url, "https://youtu.be/abc");
                assert_eq!(format, Some(FormatPreference::Wav));
                assert_eq!(html, Some(PathBuf::from("page.html")));
                assert!(!keep_scratch);
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["tubegrab", "download", "https://youtu.be/abc", "-f", "mp3"]).is_err());
    }
}
