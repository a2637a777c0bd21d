//! Safe wrappers around FFmpeg FFI calls.
//!
//! All `unsafe` needed for routine frame and codec access is contained here
//! with explicit safety arguments. Callers outside this module should never
//! need to write `unsafe`.

use ffmpeg_next as ffmpeg;

/// Allocate a fresh `AVCodecParameters`, copy the encoder context into it,
/// and return it as a safe `ffmpeg::codec::Parameters`.
///
/// Used to describe the encoded stream to the muxer.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `avcodec_parameters_alloc` only fails under OOM.
    // `avcodec_parameters_from_context` copies fields from a live, opened
    // encoder context.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

/// Zero out `codec_tag` on an output stream so the muxer picks the tag for
/// its own container.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `codecpar` is set by `set_parameters` and is non-null; the
    // tag is a plain u32 field.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

// ── FLTP audio plane reinterpretation ───────────────────────────────────────

/// Reinterpret a raw byte slice from an FLTP audio plane as `&[f32]`.
///
/// Returns `None` if the pointer is not 4-byte aligned or the slice is
/// shorter than `sample_count * 4` bytes.
pub fn fltp_plane_as_f32(byte_slice: &[u8], sample_count: usize) -> Option<&[f32]> {
    let expected_bytes = sample_count.checked_mul(4)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_ptr();
    if (ptr as usize) % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: alignment and length are verified above. FLTP planes are
    // native-endian f32 values laid out contiguously.
    Some(unsafe { std::slice::from_raw_parts(ptr as *const f32, sample_count) })
}

/// Mutable counterpart of [`fltp_plane_as_f32`].
pub fn fltp_plane_as_f32_mut(byte_slice: &mut [u8], sample_count: usize) -> Option<&mut [f32]> {
    let expected_bytes = sample_count.checked_mul(4)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_mut_ptr();
    if (ptr as usize) % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: as above.
    Some(unsafe { std::slice::from_raw_parts_mut(ptr as *mut f32, sample_count) })
}

/// Locate plane `index` of a raw audio frame: its start pointer and the
/// number of readable bytes.
///
/// `ffmpeg-next`'s `Audio::data(index)` stops at planes whose `linesize` is
/// 0, but planar audio frames only fill in `linesize[0]`, which then
/// describes every plane. Packed frames have a single plane.
///
/// # Safety
/// `frame` must point to a live `AVFrame`.
unsafe fn plane_bounds(
    frame: *const ffmpeg::ffi::AVFrame,
    index: usize,
    planar: bool,
) -> Option<(*mut u8, usize)> {
    let planes = if planar {
        (*frame).ch_layout.nb_channels.max(0) as usize
    } else {
        1
    };
    if index >= planes || (*frame).extended_data.is_null() {
        return None;
    }
    let data = *(*frame).extended_data.add(index);
    let len = (*frame).linesize[0].max(0) as usize;
    (!data.is_null()).then_some((data, len))
}

/// Bytes of audio plane `index`, empty if the frame has no such plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    // SAFETY: the frame outlives the returned slice and `plane_bounds`
    // only reports allocated planes with their allocated length.
    unsafe {
        match plane_bounds(frame.as_ptr(), index, frame.format().is_planar()) {
            Some((data, len)) => std::slice::from_raw_parts(data, len),
            None => &[],
        }
    }
}

/// Mutable counterpart of [`audio_plane_data`].
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    let planar = frame.format().is_planar();
    // SAFETY: as above; the exclusive borrow of `frame` covers the slice.
    unsafe {
        match plane_bounds(frame.as_mut_ptr(), index, planar) {
            Some((data, len)) => std::slice::from_raw_parts_mut(data, len),
            None => &mut [],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fltp_plane_rejects_short_slice() {
        let bytes = [0u8; 7];
        assert!(fltp_plane_as_f32(&bytes, 2).is_none());
    }

    #[test]
    fn test_missing_plane_is_empty() {
        let frame = ffmpeg::util::frame::Audio::new(
            ffmpeg::util::format::sample::Sample::F32(ffmpeg::util::format::sample::Type::Planar),
            16,
            ffmpeg::util::channel_layout::ChannelLayout::MONO,
        );
        assert!(audio_plane_data(&frame, 0).len() >= 64);
        assert!(audio_plane_data(&frame, 1).is_empty());
    }

    #[test]
    fn test_fltp_plane_reads_aligned_floats() {
        let floats = [0.25f32, -0.5f32];
        // SAFETY: viewing an f32 array as bytes is always valid.
        let bytes = unsafe { std::slice::from_raw_parts(floats.as_ptr() as *const u8, 8) };
        assert_eq!(fltp_plane_as_f32(bytes, 2), Some(&floats[..]));
    }
}
