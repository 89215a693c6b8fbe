use anyhow::{Context, Result};
use jpeg_encoder::SamplingFactor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::watermark::Position;

/// Top-level configuration for the exif-studio library.
///
/// Controls how re-encoded images are written and how watermarks look.
///
/// # Loading
///
/// ```rust,no_run
/// use exif_studio::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.output.quality = 90;
/// config.watermark.font_path = Some("DejaVuSans.ttf".into());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Re-encode parameters and destination directory.
    pub output: OutputConfig,
    /// Watermark appearance.
    pub watermark: WatermarkConfig,
}

/// Output behavior for every transformation.
///
/// `quality` and `subsampling` only matter where pixels are re-encoded
/// (strip and watermark); tag edits keep the compressed data as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JPEG quality, 1–100.
    pub quality: u8,
    /// JPEG chroma subsampling.
    pub subsampling: Subsampling,
    /// Where artifacts are written. `None` puts them next to the source.
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quality: 100,
            subsampling: Subsampling::S444,
            output_dir: None,
        }
    }
}

/// JPEG chroma subsampling, stored as `0` (4:4:4), `1` (4:2:2) or `2` (4:2:0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Subsampling {
    #[default]
    S444,
    S422,
    S420,
}

impl Subsampling {
    pub fn sampling_factor(self) -> SamplingFactor {
        match self {
            Self::S444 => SamplingFactor::F_1_1,
            Self::S422 => SamplingFactor::F_2_1,
            Self::S420 => SamplingFactor::F_2_2,
        }
    }
}

impl TryFrom<u8> for Subsampling {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::S444),
            1 => Ok(Self::S422),
            2 => Ok(Self::S420),
            other => Err(format!("invalid subsampling mode {other} (expected 0, 1 or 2)")),
        }
    }
}

impl From<Subsampling> for u8 {
    fn from(s: Subsampling) -> u8 {
        match s {
            Subsampling::S444 => 0,
            Subsampling::S422 => 1,
            Subsampling::S420 => 2,
        }
    }
}

/// Watermark defaults, overridable per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// TrueType/OpenType font used to draw the text. Required for watermarking.
    pub font_path: Option<PathBuf>,
    pub position: Position,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            position: Position::Center,
            opacity: 0.5,
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.output.quality) {
            anyhow::bail!("output.quality must be 1-100, got {}", self.output.quality);
        }
        if !(0.0..=1.0).contains(&self.watermark.opacity) {
            anyhow::bail!("watermark.opacity must be 0.0-1.0, got {}", self.watermark.opacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.output.quality, 100);
        assert_eq!(config.output.subsampling, Subsampling::S444);
        assert_eq!(config.output.output_dir, None);
        assert_eq!(config.watermark.position, Position::Center);
        assert_eq!(config.watermark.opacity, 0.5);
        config.validate().unwrap();
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.output.quality = 85;
        config.output.subsampling = Subsampling::S420;
        config.watermark.position = Position::BottomRight;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.output, config.output);
        assert_eq!(loaded.watermark, config.watermark);
    }

    #[test]
    fn subsampling_is_an_integer_on_disk() {
        let json = serde_json::to_value(OutputConfig {
            subsampling: Subsampling::S422,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["subsampling"], 1);

        let bad: Result<OutputConfig, _> = serde_json::from_str(r#"{"subsampling": 3}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"watermark": {"position": "top-left"}}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.watermark.position, Position::TopLeft);
        assert_eq!(config.watermark.opacity, 0.5);
        assert_eq!(config.output.quality, 100);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config.output.quality, 100);
    }

    #[test]
    fn out_of_range_values_rejected() {
        let mut config = Config::default();
        config.output.quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watermark.opacity = 1.5;
        assert!(config.validate().is_err());
    }
}
