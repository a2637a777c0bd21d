//! Audio resampler for the transcoding pipeline
//!
//! Converts decoded PCM frames to planar float at the target channel layout
//! and sample rate expected by the MP3 encoder. Channel downmixing (stereo
//! source to mono sprite) happens here.

use crate::error::{FfmpegError, Result, SpriteError};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

/// Sample format produced by the resampler and consumed by the encoder
pub const PIPELINE_SAMPLE_FORMAT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);

/// Channel layout for a channel count (mono for 1, stereo otherwise).
pub fn layout_for_channels(channels: u16) -> ChannelLayout {
    if channels == 1 {
        ChannelLayout::MONO
    } else {
        ChannelLayout::STEREO
    }
}

/// Audio resampler wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    context: resampling::Context,
}

impl AudioResampler {
    /// Create a resampler converting the format described by `src_frame` to
    /// FLTP at `target_layout` / `target_rate`.
    pub fn new(
        src_frame: &ffmpeg::util::frame::Audio,
        target_layout: ChannelLayout,
        target_rate: u32,
    ) -> Result<Self> {
        let src_layout = if src_frame.channel_layout().bits() == 0 {
            // No channel layout set; fall back based on channel count
            layout_for_channels(src_frame.channels() as u16)
        } else {
            src_frame.channel_layout()
        };

        let context = resampling::Context::get(
            src_frame.format(),
            src_layout,
            src_frame.rate(),
            PIPELINE_SAMPLE_FORMAT,
            target_layout,
            target_rate,
        )
        .map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::ResamplerCreate(format!(
                "{}Hz/{}ch -> {}Hz: {}",
                src_frame.rate(),
                src_frame.channels(),
                target_rate,
                e
            )))
        })?;

        Ok(Self { context })
    }

    /// Convert one input PCM frame. Returns `None` when the resampler is
    /// still buffering.
    pub fn convert(
        &mut self,
        frame: &ffmpeg::util::frame::Audio,
    ) -> Result<Option<ffmpeg::util::frame::Audio>> {
        // The output frame must start empty so swr_convert_frame allocates it
        // from the SwrContext configuration.
        let mut out = ffmpeg::util::frame::Audio::empty();

        self.context.run(frame, &mut out).map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::Resample(format!("convert: {}", e)))
        })?;

        Ok((out.samples() > 0).then_some(out))
    }

    /// Flush any remaining samples from the internal resampler buffer.
    ///
    /// A pass-through context has nothing buffered and reports an error on
    /// flush; that is treated as "no samples".
    pub fn flush(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut out = ffmpeg::util::frame::Audio::empty();
        if let Err(e) = self.context.flush(&mut out) {
            tracing::debug!("Resampler flush returned non-fatal error: {}", e);
            return Ok(None);
        }

        Ok((out.samples() > 0).then_some(out))
    }
}
