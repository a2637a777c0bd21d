//! Media engine seam
//!
//! Orchestration (`normalize`, `builder`) only talks to a [`MediaEngine`].
//! Every method blocks; callers run them on `spawn_blocking` threads.

use std::path::{Path, PathBuf};

use crate::config::AudioConfig;
use crate::error::{Result, SpriteError};
use crate::ffmpeg;
use crate::files;
use crate::transcode::{self, TranscodeSummary};

/// Probe, normalize and concatenate audio files
pub trait MediaEngine: Send + Sync + 'static {
    /// Container duration of `path` in milliseconds, unrounded.
    fn probe_duration_ms(&self, path: &Path) -> Result<f64>;

    /// Length of the audio a decoder actually yields, in milliseconds.
    /// Engines that cannot tell the two apart report the container duration.
    fn content_duration_ms(&self, path: &Path) -> Result<f64> {
        self.probe_duration_ms(path)
    }

    /// Re-encode `input` to the target profile at `output`, padded with
    /// trailing silence to exactly `target_secs` seconds.
    fn normalize_clip(&self, input: &Path, output: &Path, target_secs: u64) -> Result<()>;

    /// Concatenate `inputs` in order into one stream at `output`.
    fn concat_clips(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// In-process FFmpeg engine
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    audio: AudioConfig,
}

impl FfmpegEngine {
    /// Initialize FFmpeg and build an engine encoding to `audio`.
    pub fn new(audio: AudioConfig) -> Result<Self> {
        ffmpeg::init()?;
        Ok(Self { audio })
    }

    pub fn audio(&self) -> &AudioConfig {
        &self.audio
    }

    fn encode_to(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        pad_to_secs: Option<u64>,
    ) -> Result<TranscodeSummary> {
        files::write_atomically(output, |tmp| {
            transcode::transcode_to_mp3(inputs, tmp, &self.audio, pad_to_secs)
                .map_err(|e| encode_failure(output, e))
        })
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe_duration_ms(&self, path: &Path) -> Result<f64> {
        ffmpeg::context::probe_duration_ms(path)
    }

    fn content_duration_ms(&self, path: &Path) -> Result<f64> {
        transcode::decoded_duration_ms(path).map_err(|e| match e {
            SpriteError::Ffmpeg(e) => SpriteError::probe(path, e),
            other => other,
        })
    }

    fn normalize_clip(&self, input: &Path, output: &Path, target_secs: u64) -> Result<()> {
        let summary = self.encode_to(&[input.to_path_buf()], output, Some(target_secs))?;
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            target_secs,
            padded_samples = summary.padded_samples,
            sample_rate = summary.sample_rate,
            "clip re-encoded"
        );
        Ok(())
    }

    fn concat_clips(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let summary = self.encode_to(inputs, output, None)?;
        tracing::debug!(
            inputs = inputs.len(),
            output = %output.display(),
            duration_ms = summary.duration_ms(),
            "clips concatenated"
        );
        Ok(())
    }
}

/// Codec-level failures while producing `output` surface as encode errors.
/// Filesystem errors keep their own kind.
fn encode_failure(output: &Path, err: SpriteError) -> SpriteError {
    match err {
        SpriteError::Ffmpeg(e) => SpriteError::encode(output, e),
        SpriteError::Probe { path, message } => {
            SpriteError::encode(output, format!("{}: {}", path.display(), message))
        }
        other => other,
    }
}
