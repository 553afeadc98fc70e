//! Error types for the `videodecode` crate.
//!
//! This module defines [`DecodeError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context (paths,
//! offending argument values, codec and device names) that the CLI can print
//! them verbatim.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `videodecode` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The input path given on the command line does not exist.
    #[error("input file doesn't exist: {}", path.display())]
    InputNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The media file exists but could not be opened or probed.
    #[error("Failed to open media file at {}: {reason}", path.display())]
    FileOpen {
        /// Path passed to [`Demuxer::open`](crate::Demuxer::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A seek was requested with a seek mode other than 0 or 1.
    #[error("Invalid seek mode value: {0} (expected 0 = exact frame, 1 = previous key frame)")]
    InvalidSeekMode(i64),

    /// A seek was requested with a seek criteria other than 0 or 1.
    #[error("Invalid seek criteria value: {0} (expected 0 = frame number, 1 = time stamp)")]
    InvalidSeekCriteria(i64),

    /// The crop rectangle is malformed or does not fit the decoded frame.
    #[error("Invalid crop rectangle: {0}")]
    InvalidCrop(String),

    /// The requested decode device does not exist.
    #[error("Decode device {device_id} not found ({device_count} device(s) available)")]
    DeviceNotFound {
        /// Requested device index.
        device_id: i32,
        /// Number of devices the backend exposes.
        device_count: usize,
    },

    /// The stream's codec (or its bit depth) cannot be decoded on the device.
    #[error("Codec {codec} ({bit_depth}-bit) is not supported on this device {device_name}")]
    CodecNotSupported {
        /// Codec name as reported by the container.
        codec: String,
        /// Name of the device the check ran against.
        device_name: String,
        /// Luma bit depth of the stream.
        bit_depth: u32,
    },

    /// A video frame could not be decoded or prepared for output.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The resize stage could not be configured or run.
    #[error("Failed to resize frame: {0}")]
    ResizeError(String),

    /// A surface could not be converted to RGB.
    #[error("Failed to convert frame to RGB: {0}")]
    RgbConversionError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while writing frames.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for DecodeError {
    fn from(error: FfmpegError) -> Self {
        DecodeError::FfmpegError(error.to_string())
    }
}
