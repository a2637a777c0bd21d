pub mod builder;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod files;
pub mod logging;
pub mod normalize;
pub mod sprite;
pub mod transcode;

#[cfg(test)]
pub(crate) mod tests;

pub use builder::{build_sprite, SpriteOutcome};
pub use config::{AudioConfig, LogFormat, PathsConfig, SpriteConfig};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{FfmpegError, Result, SpriteError};
pub use ffmpeg::version_info as ffmpeg_version_info;
pub use ffmpeg::{init, install_log_filter};
pub use normalize::{normalize, ClipOutcome, ClipReport, NormalizeReport};
pub use sprite::{clip_id, SpriteEntry, SpriteMap};
