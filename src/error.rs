use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the sprite pipeline
#[derive(Error, Debug)]
pub enum SpriteError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// The decoder could not read a media file or report its duration
    #[error("Failed to probe {path:?}: {message}")]
    Probe { path: PathBuf, message: String },

    /// A normalization or concatenation job failed
    #[error("Encoding failed for {path:?}: {message}")]
    Encode { path: PathBuf, message: String },

    /// A required directory is missing or unreadable
    #[error("Filesystem error at {path:?}: {message}")]
    Filesystem { path: PathBuf, message: String },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sprite map serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A worker task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpriteError {
    pub fn probe(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn encode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Encode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this failure kind.
    ///
    /// Raw FFmpeg errors only escape the engine during encoding, so they share
    /// the encode code.
    pub fn exit_code(&self) -> u8 {
        match self {
            SpriteError::Config(_) => 2,
            SpriteError::Filesystem { .. } | SpriteError::Io(_) => 3,
            SpriteError::Probe { .. } => 4,
            SpriteError::Encode { .. } | SpriteError::Ffmpeg(_) => 5,
            SpriteError::Json(_) | SpriteError::Internal(_) => 1,
        }
    }
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening an input media file
    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    /// The input has no audio stream to decode
    #[error("No audio stream: {0}")]
    NoAudioStream(String),

    /// The requested decoder could not be created
    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    /// The requested encoder is not part of this FFmpeg build
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure opening or configuring an encoder
    #[error("Failed to create encoder: {0}")]
    EncoderCreate(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure converting samples
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Failure creating an output format muxer
    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    /// Failure decoding a packet into a frame
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// Failure encoding a frame into a packet
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure configuring stream contexts or parameters
    #[error("Stream configuration failed: {0}")]
    StreamConfig(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SpriteError>;
