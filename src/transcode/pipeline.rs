//! Audio transcoding pipeline
//!
//! Combines `AudioDecoder` → `AudioResampler` → `Mp3Encoder` → MP3 muxer.
//! One pipeline run reads any number of inputs in order and writes them as a
//! single continuous MP3 stream, optionally trimmed and silence-padded to an
//! exact sample count. A single input with a padding target is a clip
//! normalization; many inputs without one is a sprite concatenation.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;

use crate::config::AudioConfig;
use crate::error::{FfmpegError, Result, SpriteError};
use crate::ffmpeg::context::InputContext;
use crate::ffmpeg::helpers;

use super::decoder::AudioDecoder;
use super::encoder::Mp3Encoder;
use super::resampler::{layout_for_channels, AudioResampler, PIPELINE_SAMPLE_FORMAT};

/// Sample rate used when neither the config nor the first input has one
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// What a pipeline run produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeSummary {
    /// Output sample rate
    pub sample_rate: u32,
    /// Samples per channel handed to the encoder
    pub samples_written: u64,
    /// Trailing silence appended to reach the target length
    pub padded_samples: u64,
}

impl TranscodeSummary {
    /// Encoded length in milliseconds, before encoder delay and padding.
    pub fn duration_ms(&self) -> f64 {
        self.samples_written as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Decode `inputs` in order and encode them into one MP3 file at `output`.
///
/// The output sample rate is `audio.sample_rate`, else the first input's
/// rate; later inputs are resampled to it. With `pad_to_secs`, the output is
/// exactly `pad_to_secs * rate` samples long: decoded audio past that point
/// is dropped and any shortfall is filled with silence.
pub fn transcode_to_mp3(
    inputs: &[PathBuf],
    output: &Path,
    audio: &AudioConfig,
    pad_to_secs: Option<u64>,
) -> Result<TranscodeSummary> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| SpriteError::encode(output, "no inputs to encode"))?;

    let first = DecodeSource::open(first)?;
    let sample_rate = audio.sample_rate.unwrap_or(match first.decoder.sample_rate() {
        0 => FALLBACK_SAMPLE_RATE,
        rate => rate,
    });
    let limit = pad_to_secs.map(|secs| secs * sample_rate as u64);

    tracing::debug!(
        inputs = inputs.len(),
        output = %output.display(),
        sample_rate,
        limit_samples = ?limit,
        "transcode_to_mp3: starting"
    );

    let mut sink = EncodeSink::open(output, audio, sample_rate, limit)?;
    sink.consume(first)?;
    for path in rest {
        sink.consume(DecodeSource::open(path)?)?;
    }
    let summary = sink.finish()?;

    tracing::debug!(
        samples = summary.samples_written,
        padded = summary.padded_samples,
        "transcode_to_mp3: done"
    );

    Ok(summary)
}

/// Decode all of `path` and return its length in milliseconds.
///
/// Decoders drop the encoder delay and padding an MP3 declares in its
/// LAME tag, so this is the length of the audio itself.
pub fn decoded_duration_ms(path: &Path) -> Result<f64> {
    let DecodeSource {
        mut input,
        mut decoder,
        stream_index,
    } = DecodeSource::open(path)?;
    let mut rate = decoder.sample_rate();
    let mut samples: u64 = 0;

    let mut count = |decoder: &mut AudioDecoder| -> Result<()> {
        while let Some(frame) = decoder.receive_frame()? {
            samples += frame.samples() as u64;
            if frame.rate() > 0 {
                rate = frame.rate();
            }
        }
        Ok(())
    };

    for (stream, packet) in input.inner_mut().packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        count(&mut decoder)?;
    }
    decoder.send_eof()?;
    count(&mut decoder)?;

    if rate == 0 {
        return Err(SpriteError::probe(path, "decoded audio has no sample rate"));
    }
    let ms = samples as f64 * 1000.0 / rate as f64;
    tracing::trace!(path = %path.display(), samples, rate, duration_ms = ms, "decoded length");
    Ok(ms)
}

/// An opened input with a decoder attached to its best audio stream
struct DecodeSource {
    input: InputContext,
    decoder: AudioDecoder,
    stream_index: usize,
}

impl DecodeSource {
    fn open(path: &Path) -> Result<Self> {
        let input = InputContext::open(path)?;
        let stream_index = input.require_audio_stream()?;
        let decoder = {
            let stream = input.inner().stream(stream_index).ok_or_else(|| {
                SpriteError::Ffmpeg(FfmpegError::NoAudioStream(path.display().to_string()))
            })?;
            AudioDecoder::open(&stream)?
        };
        Ok(Self {
            input,
            decoder,
            stream_index,
        })
    }
}

/// Encoder, muxer and the PCM FIFO between them
struct EncodeSink {
    encoder: Mp3Encoder,
    writer: Mp3Writer,
    fifo: PcmFifo,
    layout: ChannelLayout,
    sample_rate: u32,
    limit: Option<u64>,
    /// Samples accepted into the FIFO so far (bounded by `limit`)
    accepted: u64,
    /// PTS of the next frame sent to the encoder
    next_pts: i64,
}

impl EncodeSink {
    fn open(output: &Path, audio: &AudioConfig, sample_rate: u32, limit: Option<u64>) -> Result<Self> {
        let encoder = Mp3Encoder::open(sample_rate, audio.channels, audio.bitrate)?;
        let writer = Mp3Writer::create(output, &encoder)?;
        Ok(Self {
            encoder,
            writer,
            fifo: PcmFifo::new(audio.channels as usize),
            layout: layout_for_channels(audio.channels),
            sample_rate,
            limit,
            accepted: 0,
            next_pts: 0,
        })
    }

    /// Decode every audio packet of `source` into the FIFO.
    fn consume(&mut self, source: DecodeSource) -> Result<()> {
        let DecodeSource {
            mut input,
            mut decoder,
            stream_index,
        } = source;
        let mut resampler: Option<AudioResampler> = None;

        for (stream, packet) in input.inner_mut().packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            self.drain_decoder(&mut decoder, &mut resampler)?;
        }

        decoder.send_eof()?;
        self.drain_decoder(&mut decoder, &mut resampler)?;

        if let Some(rsmp) = resampler.as_mut() {
            if let Some(tail) = rsmp.flush()? {
                self.push(&tail)?;
            }
        }
        Ok(())
    }

    fn drain_decoder(
        &mut self,
        decoder: &mut AudioDecoder,
        resampler: &mut Option<AudioResampler>,
    ) -> Result<()> {
        while let Some(frame) = decoder.receive_frame()? {
            // Lazily create the resampler from the first decoded frame
            if resampler.is_none() {
                tracing::trace!(
                    sample_rate = frame.rate(),
                    channels = frame.channels(),
                    format = ?frame.format(),
                    "creating resampler from first frame"
                );
                *resampler = Some(AudioResampler::new(&frame, self.layout, self.sample_rate)?);
            }
            if let Some(rsmp) = resampler.as_mut() {
                if let Some(converted) = rsmp.convert(&frame)? {
                    self.push(&converted)?;
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(self.accepted) as usize,
            None => usize::MAX,
        };
        let taken = self.fifo.push_frame(frame, room)?;
        self.accepted += taken as u64;
        self.encode_full_frames()
    }

    fn encode_full_frames(&mut self) -> Result<()> {
        let frame_size = self.encoder.frame_size();
        while self.fifo.len() >= frame_size {
            let frame = self.fifo.pop_frame(frame_size, self.layout, self.sample_rate)?;
            self.encode(frame)?;
        }
        Ok(())
    }

    fn encode(&mut self, mut frame: ffmpeg::util::frame::Audio) -> Result<()> {
        frame.set_pts(Some(self.next_pts));
        self.next_pts += frame.samples() as i64;
        self.encoder.send_frame(&frame)?;
        self.write_pending()
    }

    fn write_pending(&mut self) -> Result<()> {
        while let Some(packet) = self.encoder.receive_packet()? {
            self.writer.write_packet(packet)?;
        }
        Ok(())
    }

    /// Pad to the target length, flush encoder and muxer.
    fn finish(mut self) -> Result<TranscodeSummary> {
        let mut padded = 0;
        if let Some(limit) = self.limit {
            padded = limit.saturating_sub(self.accepted);
            self.fifo.push_silence(padded as usize);
            self.accepted += padded;
        }

        self.encode_full_frames()?;
        let remainder = self.fifo.len();
        if remainder > 0 {
            let frame = self.fifo.pop_frame(remainder, self.layout, self.sample_rate)?;
            self.encode(frame)?;
        }

        self.encoder.send_eof()?;
        self.write_pending()?;
        self.writer.finish()?;

        Ok(TranscodeSummary {
            sample_rate: self.sample_rate,
            samples_written: self.next_pts as u64,
            padded_samples: padded,
        })
    }
}

/// Planar f32 sample queue that re-chunks arbitrary decoder frames into the
/// fixed frame size the MP3 encoder demands.
struct PcmFifo {
    planes: Vec<Vec<f32>>,
}

impl PcmFifo {
    fn new(channels: usize) -> Self {
        Self {
            planes: vec![Vec::new(); channels.max(1)],
        }
    }

    fn len(&self) -> usize {
        self.planes[0].len()
    }

    /// Append at most `max` samples of an FLTP frame. Returns how many were
    /// taken.
    fn push_frame(&mut self, frame: &ffmpeg::util::frame::Audio, max: usize) -> Result<usize> {
        let n = frame.samples().min(max);
        if n == 0 {
            return Ok(0);
        }
        for (ch, plane) in self.planes.iter_mut().enumerate() {
            let data = helpers::audio_plane_data(frame, ch);
            let floats = helpers::fltp_plane_as_f32(data, frame.samples()).ok_or_else(|| {
                SpriteError::Ffmpeg(FfmpegError::Resample(format!(
                    "FLTP plane {} unreadable: format={:?}, samples={}, bytes={}",
                    ch,
                    frame.format(),
                    frame.samples(),
                    data.len()
                )))
            })?;
            plane.extend_from_slice(&floats[..n]);
        }
        Ok(n)
    }

    fn push_silence(&mut self, n: usize) {
        for plane in &mut self.planes {
            plane.resize(plane.len() + n, 0.0);
        }
    }

    /// Remove the first `n` samples as a new FLTP frame.
    fn pop_frame(
        &mut self,
        n: usize,
        layout: ChannelLayout,
        rate: u32,
    ) -> Result<ffmpeg::util::frame::Audio> {
        let mut out = ffmpeg::util::frame::Audio::new(PIPELINE_SAMPLE_FORMAT, n, layout);
        out.set_rate(rate);
        for (ch, plane) in self.planes.iter_mut().enumerate() {
            let bytes = helpers::audio_plane_data_mut(&mut out, ch);
            let floats = helpers::fltp_plane_as_f32_mut(bytes, n).ok_or_else(|| {
                SpriteError::Ffmpeg(FfmpegError::EncodeFrame(format!(
                    "cannot allocate FLTP plane {} for {} samples",
                    ch, n
                )))
            })?;
            for (dst, src) in floats.iter_mut().zip(plane.drain(..n)) {
                *dst = src;
            }
        }
        Ok(out)
    }
}

/// MP3 muxer writing one encoded audio stream to a file
struct Mp3Writer {
    output: ffmpeg::format::context::Output,
    stream_index: usize,
    encoder_timebase: ffmpeg::Rational,
    stream_timebase: ffmpeg::Rational,
}

impl Mp3Writer {
    fn create(path: &Path, encoder: &Mp3Encoder) -> Result<Self> {
        let mut output = ffmpeg::format::output_as(&path, "mp3").map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::MuxerCreate(format!("{}: {}", path.display(), e)))
        })?;

        let stream_index = {
            let mut out_stream = output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                .map_err(|e| {
                    SpriteError::Ffmpeg(FfmpegError::StreamConfig(format!(
                        "failed to add audio stream: {}",
                        e
                    )))
                })?;
            out_stream.set_parameters(encoder.codec_parameters());
            helpers::stream_reset_codec_tag(&mut out_stream);
            out_stream.set_time_base(encoder.output_timebase());
            out_stream.index()
        };

        output.write_header().map_err(|e| {
            SpriteError::Ffmpeg(FfmpegError::WriteHeader(format!("{}: {}", path.display(), e)))
        })?;

        // The muxer may pick its own timebase while writing the header
        let stream_timebase = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or_else(|| encoder.output_timebase());

        Ok(Self {
            output,
            stream_index,
            encoder_timebase: encoder.output_timebase(),
            stream_timebase,
        })
    }

    fn write_packet(&mut self, mut packet: ffmpeg::codec::packet::Packet) -> Result<()> {
        packet.set_stream(self.stream_index);
        packet.rescale_ts(self.encoder_timebase, self.stream_timebase);
        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| SpriteError::Ffmpeg(FfmpegError::WritePacket(e.to_string())))
    }

    fn finish(mut self) -> Result<()> {
        self.output
            .write_trailer()
            .map_err(|e| SpriteError::Ffmpeg(FfmpegError::WriteTrailer(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fltp_frame(samples: &[f32], rate: u32) -> ffmpeg::util::frame::Audio {
        let mut frame =
            ffmpeg::util::frame::Audio::new(PIPELINE_SAMPLE_FORMAT, samples.len(), ChannelLayout::MONO);
        frame.set_rate(rate);
        let bytes = helpers::audio_plane_data_mut(&mut frame, 0);
        helpers::fltp_plane_as_f32_mut(bytes, samples.len())
            .unwrap()
            .copy_from_slice(samples);
        frame
    }

    #[test]
    fn test_fifo_rechunks_and_respects_limit() {
        crate::ffmpeg::init().unwrap();
        let mut fifo = PcmFifo::new(1);

        let frame = fltp_frame(&[0.1, 0.2, 0.3, 0.4, 0.5], 8_000);
        assert_eq!(fifo.push_frame(&frame, 3).unwrap(), 3);
        assert_eq!(fifo.len(), 3);

        fifo.push_silence(2);
        assert_eq!(fifo.len(), 5);

        let out = fifo.pop_frame(4, ChannelLayout::MONO, 8_000).unwrap();
        assert_eq!(out.samples(), 4);
        let data = helpers::audio_plane_data(&out, 0);
        let floats = helpers::fltp_plane_as_f32(data, 4).unwrap();
        assert_eq!(floats, &[0.1, 0.2, 0.3, 0.0]);
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn test_summary_duration() {
        let summary = TranscodeSummary {
            sample_rate: 44_100,
            samples_written: 88_200,
            padded_samples: 1_000,
        };
        assert_eq!(summary.duration_ms(), 2000.0);
    }

    #[test]
    fn test_no_inputs_is_encode_error() {
        let err = transcode_to_mp3(&[], Path::new("out.mp3"), &AudioConfig::default(), None)
            .unwrap_err();
        assert!(matches!(err, SpriteError::Encode { .. }));
    }
}
