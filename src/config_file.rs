//! Configuration file support
//!
//! Loads pipeline configuration from TOML files. Every section and key is
//! optional; anything left out keeps the built-in default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{LogFormat, SpriteConfig};
use crate::error::{Result, SpriteError};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Directory and output locations
    pub paths: Option<PathSettings>,
    /// Target encoding
    pub audio: Option<AudioSettings>,
    /// Normalizer settings
    pub normalize: Option<NormalizeSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSettings {
    pub input_dir: Option<PathBuf>,
    pub normalized_dir: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub sprite_map_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Output channel count
    pub channels: Option<u16>,
    /// MP3 bitrate in bps
    pub bitrate: Option<u64>,
    /// Output sample rate, omitted to keep the source rate
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeSettings {
    /// Number of clips encoded at once
    pub max_parallel_jobs: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<LogFormat>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SpriteError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| SpriteError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SpriteError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Configuration file spelling out every default
    pub fn default_config() -> Self {
        let defaults = SpriteConfig::default();
        Self {
            logging: Some(LoggingSettings {
                level: Some(defaults.log_level),
                format: Some(defaults.log_format),
            }),
            paths: Some(PathSettings {
                input_dir: Some(defaults.paths.input_dir),
                normalized_dir: Some(defaults.paths.normalized_dir),
                output_path: Some(defaults.paths.output_path),
                sprite_map_path: Some(defaults.paths.sprite_map_path),
            }),
            audio: Some(AudioSettings {
                channels: Some(defaults.audio.channels),
                bitrate: Some(defaults.audio.bitrate),
                sample_rate: defaults.audio.sample_rate,
            }),
            normalize: Some(NormalizeSettings {
                max_parallel_jobs: Some(defaults.normalize.max_parallel_jobs),
            }),
        }
    }

    /// Convert to SpriteConfig, filling gaps with defaults
    pub fn into_sprite_config(self) -> SpriteConfig {
        let mut config = SpriteConfig::default();

        if let Some(logging) = self.logging {
            if let Some(level) = logging.level {
                config.log_level = level;
            }
            if let Some(format) = logging.format {
                config.log_format = format;
            }
        }

        if let Some(paths) = self.paths {
            let target = &mut config.paths;
            target.input_dir = paths.input_dir.unwrap_or(target.input_dir.clone());
            target.normalized_dir = paths
                .normalized_dir
                .unwrap_or(target.normalized_dir.clone());
            target.output_path = paths.output_path.unwrap_or(target.output_path.clone());
            target.sprite_map_path = paths
                .sprite_map_path
                .unwrap_or(target.sprite_map_path.clone());
        }

        if let Some(audio) = self.audio {
            config.audio.channels = audio.channels.unwrap_or(config.audio.channels);
            config.audio.bitrate = audio.bitrate.unwrap_or(config.audio.bitrate);
            config.audio.sample_rate = audio.sample_rate.or(config.audio.sample_rate);
        }

        if let Some(normalize) = self.normalize {
            config.normalize.max_parallel_jobs = normalize
                .max_parallel_jobs
                .unwrap_or(config.normalize.max_parallel_jobs);
        }

        config
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
