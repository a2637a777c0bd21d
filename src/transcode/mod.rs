//! Audio transcoding module
//!
//! This module handles re-encoding clips to the sprite profile:
//! - Audio decoder initialization from source streams
//! - Resampling and downmixing to the target layout and rate
//! - MP3 encoder initialization
//! - The decode → encode → mux pipeline used for padding and concatenation

pub mod decoder;
pub mod encoder;
pub mod pipeline;
pub mod resampler;

pub use encoder::is_mp3_encoder_available;
pub use pipeline::{decoded_duration_ms, transcode_to_mp3, TranscodeSummary};
