//! FFmpeg module - provides wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Log filtering for known-benign demuxer chatter
//! - Input context management and duration probing
//! - Safe accessors for raw frame planes

pub mod context;
pub mod helpers;

pub use ffmpeg_next as ffmpeg;

/// Initialize the FFmpeg library.
///
/// Call once at startup before probing or encoding. Calling it again is
/// harmless.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    ffmpeg::init().map_err(|e| {
        crate::error::FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Install a custom FFmpeg log callback that suppresses known-noisy messages.
///
/// The MP3 demuxer warns about estimated durations on almost every short,
/// VBR or tagless clip, which would bury the per-file log lines.
///
/// Must be called after `init()` and before any worker threads start,
/// because altering the global log callback is not thread-safe.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`. They run exactly once at startup before any
    // encode job is dispatched.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_WARNING as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Messages that are expected for short MP3 clips and should be suppressed.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Estimating duration from bitrate, this may be inaccurate",
    "invalid concatenated file detected - using bitrate for duration",
    "Skipping 0 bytes of junk",
    "Queue input is backward in time",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > ffmpeg_next::ffi::av_log_get_level() {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();

    if SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    eprint!("{}", msg);
}

/// Version of the linked libavformat, as `major.minor.micro`.
pub fn version_info() -> String {
    let v = ffmpeg::format::version();
    format!("libavformat {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_version_info() {
        assert!(version_info().starts_with("libavformat "));
    }
}
