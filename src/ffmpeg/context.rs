//! FFmpeg input context wrapper

use crate::error::{FfmpegError, Result, SpriteError};
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

/// Wrapper for FFmpeg input context
pub struct InputContext {
    inner: ffmpeg::format::context::Input,
    source_path: PathBuf,
}

impl InputContext {
    /// Open a media file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = ffmpeg::format::input(&path)
            .map_err(|e| FfmpegError::OpenInput(format!("{}: {}", path.display(), e)))?;

        tracing::trace!("Opened input file: {:?}", path);

        Ok(Self {
            inner,
            source_path: path.to_path_buf(),
        })
    }

    /// Container duration in seconds, or `None` when the demuxer could not
    /// determine one.
    pub fn duration_secs(&self) -> Option<f64> {
        // AV_NOPTS_VALUE is i64::MIN
        let raw = self.inner.duration();
        if raw < 0 {
            return None;
        }
        Some(raw as f64 / ffmpeg::ffi::AV_TIME_BASE as f64)
    }

    /// Find the best audio stream
    pub fn best_audio_stream(&self) -> Option<usize> {
        self.inner
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .map(|s| s.index())
    }

    /// Index of the best audio stream, or a `NoAudioStream` error.
    pub fn require_audio_stream(&self) -> Result<usize> {
        self.best_audio_stream().ok_or_else(|| {
            SpriteError::Ffmpeg(FfmpegError::NoAudioStream(
                self.source_path.display().to_string(),
            ))
        })
    }

    /// Get the inner context for direct access
    pub fn inner(&self) -> &ffmpeg::format::context::Input {
        &self.inner
    }

    /// Mutable access, needed for packet iteration
    pub fn inner_mut(&mut self) -> &mut ffmpeg::format::context::Input {
        &mut self.inner
    }
}

/// Probe the container duration of `path` in milliseconds.
///
/// The value is not rounded. Any failure to open the file or to read a
/// duration is reported as a probe error carrying FFmpeg's diagnostic.
pub fn probe_duration_ms(path: &Path) -> Result<f64> {
    let ctx = InputContext::open(path).map_err(|e| SpriteError::probe(path, e))?;
    let secs = ctx
        .duration_secs()
        .ok_or_else(|| SpriteError::probe(path, "container reports no duration"))?;
    let ms = secs * 1000.0;
    tracing::trace!(path = %path.display(), duration_ms = ms, "probed");
    Ok(ms)
}
