use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

use crate::utils::escape_html;
use crate::{DownloaderError, Result};

pub const AUDIO_MIME: &str = "audio/wav";
pub const VIDEO_MIME: &str = "video/mp4";

/// A finished file encoded for inline retrieval
#[derive(Debug, Clone)]
pub struct DeliveryLink {
    /// Suggested save name
    pub file_name: String,

    pub mime_type: &'static str,

    /// Text shown on the link
    pub label: String,

    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
}

/// Infer the content type from the file extension.
///
/// Only `.wav` and the video containers produced by the downloader are
/// expected here; anything that is not `.wav` is labelled as video.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wav") => AUDIO_MIME,
        _ => VIDEO_MIME,
    }
}

/// Read the whole file and encode it as a base64 data URL.
///
/// The file is held in memory in full.
pub fn encode(path: &Path, label: &str) -> Result<DeliveryLink> {
    let data = fs_err::read(path).map_err(|source| DownloaderError::DeliveryRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mime_type = mime_type_for(path);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    tracing::debug!("Encoding {} ({} bytes) as {}", file_name, data.len(), mime_type);

    Ok(DeliveryLink {
        file_name,
        mime_type,
        label: label.to_string(),
        data_url: format!("data:{};base64,{}", mime_type, STANDARD.encode(&data)),
    })
}

impl DeliveryLink {
    /// Render as an HTML download anchor
    pub fn to_html(&self) -> String {
        format!(
            r#"<a class="download" href="{}" download="{}">{}</a>"#,
            self.data_url,
            escape_html(&self.file_name),
            escape_html(&self.label)
        )
    }

    /// Render as an inline `<video>` element
    pub fn to_video_html(&self) -> String {
        format!(
            r#"<video controls preload="metadata" src="{}"></video>"#,
            self.data_url
        )
    }

    /// Decode the payload back into bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        let payload = self
            .data_url
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .ok_or_else(|| anyhow::anyhow!("Not a base64 data URL"))?;
        Ok(STANDARD.decode(payload)?)
    }
}
