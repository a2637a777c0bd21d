//! Audio decoder for the transcoding pipeline
//!
//! Turns compressed packets of one source stream (MP3 in practice, anything
//! FFmpeg can read in general) into raw PCM frames.

use crate::error::{FfmpegError, Result, SpriteError};
use ffmpeg_next as ffmpeg;

/// Decoder bound to one audio stream of an input file
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
}

impl AudioDecoder {
    /// Open a decoder from the stream's codec parameters.
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let decoder = ffmpeg::codec::Context::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().audio())
            .map_err(|e| {
                SpriteError::Ffmpeg(FfmpegError::DecoderCreate(format!(
                    "stream {}: {}",
                    stream_index, e
                )))
            })?;

        Ok(Self {
            decoder,
            stream_index,
        })
    }

    /// Feed one packet. Undecodable data (a damaged frame, a stray tag
    /// fragment) is skipped.
    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        match self.decoder.send_packet(packet) {
            Err(ffmpeg::Error::InvalidData) => {
                tracing::debug!(stream = self.stream_index, "skipping undecodable packet");
                Ok(())
            }
            other => other.map_err(|e| self.failure("send_packet", e)),
        }
    }

    /// Signal end of input so buffered frames can be drained.
    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Err(e) if is_drained(&e) => Ok(()),
            other => other.map_err(|e| self.failure("send_eof", e)),
        }
    }

    /// Next decoded frame, or `None` when the decoder wants more input or
    /// is fully drained.
    pub fn receive_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(e) if is_drained(&e) => Ok(None),
            Err(e) => Err(self.failure("receive_frame", e)),
        }
    }

    /// Sample rate of decoded frames, 0 if the stream does not declare one.
    pub fn sample_rate(&self) -> u32 {
        self.decoder.rate()
    }

    fn failure(&self, stage: &str, err: ffmpeg::Error) -> SpriteError {
        SpriteError::Ffmpeg(FfmpegError::DecodePacket(format!(
            "{} on stream {}: {}",
            stage, self.stream_index, err
        )))
    }
}

/// EAGAIN and EOF both mean "nothing more right now".
pub(crate) fn is_drained(err: &ffmpeg::Error) -> bool {
    matches!(err, ffmpeg::Error::Eof)
        || matches!(err, ffmpeg::Error::Other { errno } if *errno == ffmpeg::error::EAGAIN)
}
