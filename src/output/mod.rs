use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::delivery::{self, DeliveryLink};
use crate::extractors::{MediaArtifact, MediaKind};
use crate::utils::{escape_html, format_file_size};

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
h1{color:#f00;text-align:center}\
.success{background:#d4edda;color:#155724;padding:1rem;border-radius:.25rem;margin-bottom:1rem}\
video{width:100%;margin:1rem 0}\
a.download{display:inline-block;padding:.5em 1em;color:#fff;background:#f00;text-decoration:none;border-radius:4px}";

/// Text of the download link for an artifact
pub fn link_label(kind: MediaKind) -> String {
    format!("Download {}", kind)
}

/// A delivered copy of an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Copy the finished file out of its scratch directory
pub fn save_artifact(artifact: &MediaArtifact, output_dir: &Path) -> Result<SavedFile> {
    fs_err::create_dir_all(output_dir)?;
    let target = output_dir.join(artifact.file_name());

    let size = match fs_err::copy(&artifact.path, &target) {
        Ok(size) => size,
        Err(e) => {
            discard(&target);
            return Err(e).with_context(|| format!("Failed to save {}", artifact.file_name()));
        }
    };

    tracing::debug!("Saved {} to {}", artifact.path.display(), target.display());
    Ok(SavedFile { path: target, size })
}
/// Build the result page: success banner, inline player for video, download link
pub fn render_page(artifact: &MediaArtifact, link: &DeliveryLink, completed_at: DateTime<Utc>) -> String {
    let player = match artifact.kind {
        MediaKind::Video => link.to_video_html(),
        MediaKind::Audio => String::new(),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>{style}</style>\n</head>\n<body>\n<h1>Tubegrab</h1>\n\
         <div class=\"success\">Download complete! \"{title}\"</div>\n{player}\n<p>{link}</p>\n\
         <p><small>{completed}</small></p>\n</body>\n</html>\n",
        title = escape_html(&artifact.title),
        style = PAGE_STYLE,
        player = player,
        link = link.to_html(),
        completed = completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Encode the artifact and build the result page in memory
pub fn build_page(artifact: &MediaArtifact, completed_at: DateTime<Utc>) -> Result<String> {
    let link = delivery::encode(&artifact.path, &link_label(artifact.kind))?;
    Ok(render_page(artifact, &link, completed_at))
}

/// Offer the artifact: copy it into `output_dir` and, if asked, write the page.
///
/// Either everything is written or nothing is left behind.
pub fn deliver(
    artifact: &MediaArtifact,
    output_dir: &Path,
    page_path: Option<&Path>,
    completed_at: DateTime<Utc>,
) -> Result<SavedFile> {
    let page = match page_path {
        Some(path) => Some((path, build_page(artifact, completed_at)?)),
        None => None,
    };

    let saved = save_artifact(artifact, output_dir)?;

    if let Some((path, page)) = page {
        if let Err(e) = write_text(path, &page) {
            discard(&saved.path);
            return Err(e);
        }
    }

    Ok(saved)
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }

    if let Err(e) = fs_err::write(path, text) {
        discard(path);
        return Err(e.into());
    }

    tracing::debug!("Wrote {} ({})", path.display(), format_file_size(text.len() as u64));
    Ok(())
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs_err::remove_file(path) {
            tracing::warn!("Could not remove partial output: {}", e);
        }
    }
}
