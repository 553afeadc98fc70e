//! FFmpeg runtime setup.
//!
//! FFmpeg has its own internal logging system, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade. Left alone it prints
//! warnings about every damaged packet to stderr, which interleaves badly
//! with the driver's own output. This module initializes the libraries and
//! keeps FFmpeg's verbosity in step with the Rust-side log filter, while
//! still allowing an explicit override from the command line.
//!
//! # Example
//!
//! ```no_run
//! use videodecode::FfmpegLogLevel;
//!
//! videodecode::ffmpeg::initialize()?;
//! videodecode::set_ffmpeg_log_level(FfmpegLogLevel::for_filter(log::max_level()));
//! # Ok::<(), videodecode::DecodeError>(())
//! ```

use std::str::FromStr;

use ffmpeg_next::util::log::Level;
use log::LevelFilter;

use crate::error::DecodeError;

/// FFmpeg internal log verbosity level, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's own default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    /// Pick the FFmpeg verbosity matching a Rust log filter.
    ///
    /// FFmpeg is kept one step quieter than the Rust side: `warn` only lets
    /// FFmpeg errors through, so routine decoder chatter about concealed
    /// macroblocks does not drown the driver's warnings.
    pub fn for_filter(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::Off => FfmpegLogLevel::Quiet,
            LevelFilter::Error => FfmpegLogLevel::Fatal,
            LevelFilter::Warn => FfmpegLogLevel::Error,
            LevelFilter::Info => FfmpegLogLevel::Warning,
            LevelFilter::Debug => FfmpegLogLevel::Verbose,
            LevelFilter::Trace => FfmpegLogLevel::Debug,
        }
    }

    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "panic" => Ok(FfmpegLogLevel::Panic),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            "trace" => Ok(FfmpegLogLevel::Trace),
            other => Err(format!("unsupported FFmpeg log level: {other}")),
        }
    }
}

/// Initialize the FFmpeg libraries. Safe to call more than once.
pub fn initialize() -> Result<(), DecodeError> {
    ffmpeg_next::init()
        .map_err(|error| DecodeError::FfmpegError(format!("initialisation failed: {error}")))
}

/// Set the FFmpeg internal log verbosity level.
///
/// This controls what FFmpeg prints to stderr. It does **not** affect
/// Rust-side `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    log::debug!("Setting FFmpeg log level to {level:?}");
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}
