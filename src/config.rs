//! Pipeline configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpriteError};

/// Directory and file locations shared by both entry points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Source clips
    pub input_dir: PathBuf,

    /// Normalized clips, same basenames as the input
    pub normalized_dir: PathBuf,

    /// Concatenated sprite audio
    pub output_path: PathBuf,

    /// JSON sprite map
    pub sprite_map_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./sounds"),
            normalized_dir: PathBuf::from("./normalized"),
            output_path: PathBuf::from("./results/sound_effects.mp3"),
            sprite_map_path: PathBuf::from("./results/spritemap.json"),
        }
    }
}

/// Target encoding for normalized clips and the sprite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output channel count (1 = mono)
    pub channels: u16,

    /// MP3 bitrate in bps
    pub bitrate: u64,

    /// Output sample rate. `None` keeps the source rate.
    pub sample_rate: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            bitrate: 128_000,
            sample_rate: None,
        }
    }
}

/// Normalizer behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Number of clips encoded at once
    pub max_parallel_jobs: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: 1,
        }
    }
}

/// Log output format
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,

    pub paths: PathsConfig,

    pub audio: AudioConfig,

    pub normalize: NormalizeConfig,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            paths: PathsConfig::default(),
            audio: AudioConfig::default(),
            normalize: NormalizeConfig::default(),
        }
    }
}

impl SpriteConfig {
    /// Reject values the encoder cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.audio.channels, 1 | 2) {
            return Err(SpriteError::Config(format!(
                "audio.channels must be 1 or 2, got {}",
                self.audio.channels
            )));
        }
        if self.audio.bitrate == 0 {
            return Err(SpriteError::Config("audio.bitrate must be positive".into()));
        }
        if self.audio.sample_rate == Some(0) {
            return Err(SpriteError::Config(
                "audio.sample_rate must be positive".into(),
            ));
        }
        if self.normalize.max_parallel_jobs == 0 {
            return Err(SpriteError::Config(
                "normalize.max_parallel_jobs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| SpriteError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SpriteError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}
