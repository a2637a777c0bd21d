//! MP3 encoder for the transcoding pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` to encode FLTP PCM frames into MP3
//! packets at a fixed bitrate.

use crate::error::{FfmpegError, Result, SpriteError};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;

use super::decoder::is_drained;
use super::resampler::{layout_for_channels, PIPELINE_SAMPLE_FORMAT};

/// MPEG-1 Layer III samples per channel per frame
pub const MP3_FRAME_SIZE: usize = 1152;

/// MP3 encoder backed by a real FFmpeg codec context
pub struct Mp3Encoder {
    encoder: ffmpeg::encoder::Audio,
    frame_size: usize,
    output_timebase: ffmpeg::Rational,
}

impl Mp3Encoder {
    /// Open an MP3 encoder at the given parameters.
    pub fn open(sample_rate: u32, channels: u16, bitrate: u64) -> Result<Self> {
        let codec = codec::encoder::find(codec::Id::MP3).ok_or_else(|| {
            SpriteError::Ffmpeg(FfmpegError::EncoderNotFound(
                "MP3 encoder not found in this FFmpeg build".into(),
            ))
        })?;

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::EncoderCreate(format!(
                "cannot get audio encoder handle: {}",
                e
            )))
        })?;

        audio_enc.set_rate(sample_rate as i32);
        audio_enc.set_format(PIPELINE_SAMPLE_FORMAT);
        audio_enc.set_channel_layout(layout_for_channels(channels));
        audio_enc.set_bit_rate(bitrate as usize);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::EncoderCreate(format!(
                "{} at {}Hz/{}ch/{}bps: {}",
                codec.name(),
                sample_rate,
                channels,
                bitrate,
                e
            )))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => MP3_FRAME_SIZE,
            n => n,
        };

        tracing::debug!(
            encoder = codec.name(),
            sample_rate,
            channels,
            bitrate,
            frame_size,
            "MP3 encoder opened"
        );

        Ok(Self {
            encoder,
            frame_size,
            output_timebase: ffmpeg::Rational::new(1, sample_rate as i32),
        })
    }

    /// Send one PCM frame to the encoder.
    pub fn send_frame(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        self.encoder.send_frame(frame).map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::EncodeFrame(format!("send_frame: {}", e)))
        })
    }

    /// Send EOF to flush the encoder's buffered output.
    pub fn send_eof(&mut self) -> Result<()> {
        self.encoder.send_eof().map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::EncodeFrame(format!("send_eof: {}", e)))
        })
    }

    /// Receive one encoded packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(e) if is_drained(&e) => Ok(None),
            Err(e) => Err(SpriteError::Ffmpeg(FfmpegError::EncodeFrame(format!(
                "receive_packet: {}",
                e
            )))),
        }
    }

    /// The number of samples per channel the encoder expects per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The encoder timebase (1 / sample_rate).
    pub fn output_timebase(&self) -> ffmpeg::Rational {
        self.output_timebase
    }

    /// Codec parameters for the encoded stream, for muxer stream setup.
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        crate::ffmpeg::helpers::encoder_codec_parameters(&self.encoder)
    }
}

/// Check whether the linked FFmpeg build includes an MP3 encoder.
pub fn is_mp3_encoder_available() -> bool {
    codec::encoder::find(codec::Id::MP3).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp3_encoder_creation() {
        crate::ffmpeg::init().unwrap();
        if !is_mp3_encoder_available() {
            return;
        }
        let enc = Mp3Encoder::open(44_100, 1, 128_000);
        assert!(enc.is_ok(), "MP3 encoder should open: {:?}", enc.err());
        let enc = enc.unwrap();
        assert_eq!(enc.frame_size(), MP3_FRAME_SIZE);
        assert_eq!(enc.output_timebase(), ffmpeg::Rational::new(1, 44_100));
    }
}
