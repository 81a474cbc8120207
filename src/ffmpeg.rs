//! FFmpeg initialisation and log level control.
//!
//! FFmpeg prints its own diagnostics to stderr, independently of the `log`
//! crate. Parallel scans open one decoder per worker, so a noisy file can
//! repeat the same warning many times; [`set_ffmpeg_log_level`] tames that
//! without importing `ffmpeg-next` directly.
//!
//! ```no_run
//! use peakclip::FfmpegLogLevel;
//!
//! peakclip::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::path::Path;

use ffmpeg_next::util::log::Level;

use crate::error::PeakclipError;

/// FFmpeg internal log verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Unrecoverable errors only.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings. FFmpeg's default.
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

/// Set FFmpeg's own stderr verbosity. Does not affect `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Initialise FFmpeg. Safe to call repeatedly and from several threads.
pub(crate) fn ensure_initialized(path: &Path) -> Result<(), PeakclipError> {
    ffmpeg_next::init().map_err(|error| PeakclipError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })
}
