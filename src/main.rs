use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubegrab::cli::{Cli, Commands};
use tubegrab::config::Config;
use tubegrab::extractors::DownloadRequest;
use tubegrab::progress::{BarSink, ProgressSink};
use tubegrab::session::Session;
use tubegrab::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "tubegrab=debug" } else { "tubegrab=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Download {
            url,
            format,
            output_dir,
            html,
            keep_scratch,
        } => {
            let format = format.unwrap_or(config.app.default_format);
            let request = DownloadRequest::new(&url, format)?;
            let keep_scratch = keep_scratch || config.app.keep_scratch;

            let mut session = Session::from_config(&config).keep_failed_scratch(keep_scratch);
            let mut sink = if cli.quiet { BarSink::hidden() } else { BarSink::new() };
            sink.set(0.0, "Starting...");

            let mut outcome = match session.run(&request, &mut sink).await {
                Ok(outcome) => {
                    sink.finish();
                    outcome
                }
                Err(e) => {
                    sink.abandon();
                    return Err(e.context("Error in the download process"));
                }
            };

            // Kept before anything else can fail
            let kept = keep_scratch.then(|| outcome.keep_scratch().to_path_buf());

            let output_dir = match output_dir {
                Some(dir) => dir,
                None => config.output_dir()?,
            };
            let saved = match output::deliver(&outcome.artifact, &output_dir, html.as_deref(), outcome.completed_at) {
                Ok(saved) => saved,
                Err(e) => {
                    if let Some(dir) = &kept {
                        tracing::info!("Scratch directory kept at: {}", dir.display());
                    }
                    return Err(e.context("Error delivering the download"));
                }
            };

            println!("Download complete! \"{}\"", outcome.artifact.title);
            println!(
                "{} saved to: {} ({})",
                outcome.artifact.kind,
                saved.path.display(),
                utils::format_file_size(saved.size)
            );
            if let Some(page) = html {
                println!("Page with download link: {}", page.display());
            }
            if let Some(dir) = kept {
                println!("Scratch directory kept at: {}", dir.display());
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Wrote default configuration to: {}", path.display());
            } else if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Use --show to print it or --init to write the defaults.");
            }
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.tools.yt_dlp, &config.tools.ffmpeg).await;
            if missing.is_empty() {
                println!("All external tools are available.");
            } else {
                eprintln!("⚠️  Missing tools:");
                for dep in &missing {
                    eprintln!("   • {}", dep);
                }
                anyhow::bail!("{} required tool(s) not found", missing.len());
            }
        }
    }

    Ok(())
}
