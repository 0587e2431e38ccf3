use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extractors::FormatPreference;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// External tool locations
    pub tools: ToolsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// yt-dlp executable (name on PATH or absolute path)
    pub yt_dlp: String,

    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Parent directory for per-request scratch directories
    pub temp_dir: Option<PathBuf>,

    /// Where finished files are copied (current directory if unset)
    pub output_dir: Option<PathBuf>,

    /// Format used when none is given on the command line
    pub default_format: FormatPreference,

    /// Keep scratch directories instead of deleting them
    pub keep_scratch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig {
                yt_dlp: "yt-dlp".to_string(),
                ffmpeg: "ffmpeg".to_string(),
            },
            app: AppConfig {
                temp_dir: None,
                output_dir: None,
                default_format: FormatPreference::Video,
                keep_scratch: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub async fn load() -> Result<Self> {
        let config_path = match Self::config_path() {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("{}, using defaults", e);
                return Ok(Self::default());
            }
        };

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate a specific configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location, returning the path written
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tubegrab").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.tools.yt_dlp.trim().is_empty() {
            anyhow::bail!("tools.yt_dlp must not be empty");
        }

        if self.tools.ffmpeg.trim().is_empty() {
            anyhow::bail!("tools.ffmpeg must not be empty");
        }

        Ok(())
    }

    /// Directory finished files are copied into
    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.app.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Could not determine current directory"),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {}", self.tools.yt_dlp);
        println!("  ffmpeg: {}", self.tools.ffmpeg);
        match &self.app.temp_dir {
            Some(dir) => println!("  Scratch Directory: {}", dir.display()),
            None => println!("  Scratch Directory: (system temp)"),
        }
        match &self.app.output_dir {
            Some(dir) => println!("  Output Directory: {}", dir.display()),
            None => println!("  Output Directory: (current directory)"),
        }
        println!("  Default Format: {}", self.app.default_format);
        println!("  Keep Scratch: {}", self.app.keep_scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
tools:
  yt_dlp: /opt/bin/yt-dlp
  ffmpeg: ffmpeg
app:
  temp_dir: /var/tmp/tubegrab
  output_dir: null
  default_format: wav
  keep_scratch: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tools.yt_dlp, "/opt/bin/yt-dlp");
        assert_eq!(config.app.temp_dir, Some(PathBuf::from("/var/tmp/tubegrab")));
        assert_eq!(config.app.default_format, FormatPreference::Wav);
        assert!(config.app.keep_scratch);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.app.output_dir = Some(dir.path().join("out"));
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_empty_tool_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.tools.ffmpeg = " ".to_string();
        config.save_to(&path).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("tools.ffmpeg"));
    }
}
