//! Command-line arguments shared by the `normalize` and `build-sprite`
//! binaries

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Args;

use crate::config::{LogFormat, SpriteConfig};
use crate::config_file::{self, ConfigFile};
use crate::error::{Result, SpriteError};

/// Config file picked up from the working directory when `--config` is not
/// given
pub const DEFAULT_CONFIG_PATH: &str = "sprite.toml";

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// TOML configuration file [default: sprite.toml, if present]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the original clips
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Directory holding the normalized clips
    #[arg(long)]
    pub normalized_dir: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Write a configuration file with every default to this path and exit
    #[arg(long, value_name = "FILE")]
    pub write_default_config: Option<PathBuf>,
}

impl CommonArgs {
    /// Load the config file (if any), apply command-line overrides and
    /// validate the result.
    pub fn load_config(&self) -> Result<SpriteConfig> {
        let mut config = match self.config_path() {
            Some(path) => ConfigFile::from_file(path)?.into_sprite_config(),
            None => SpriteConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// An explicit `--config` must exist; the default one is optional.
    fn config_path(&self) -> Option<&Path> {
        match &self.config {
            Some(path) => Some(path.as_path()),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                default.is_file().then_some(default)
            }
        }
    }

    fn apply(&self, config: &mut SpriteConfig) {
        if let Some(dir) = &self.input_dir {
            config.paths.input_dir = dir.clone();
        }
        if let Some(dir) = &self.normalized_dir {
            config.paths.normalized_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }

    /// Handle `--write-default-config`. Returns the exit code when the
    /// process should stop here.
    pub fn write_default_config_if_requested(&self) -> Option<ExitCode> {
        let path = self.write_default_config.as_ref()?;
        Some(match config_file::generate_default_config(path) {
            Ok(()) => {
                println!("Default configuration written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => exit_with(&e),
        })
    }
}

/// Process exit code for a fatal error.
pub fn exit_with(err: &SpriteError) -> ExitCode {
    ExitCode::from(err.exit_code())
}

/// Install the subscriber and FFmpeg's log filter for a loaded config.
pub fn init_runtime(config: &SpriteConfig) -> Result<()> {
    crate::logging::init_logging(&config.log_level, config.log_format);
    crate::ffmpeg::init()?;
    crate::ffmpeg::install_log_filter();
    tracing::debug!(ffmpeg = %crate::ffmpeg::version_info(), ?config, "Runtime ready");
    Ok(())
}
