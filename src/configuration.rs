//! Decode configuration and argument validation.
//!
//! [`DecodeArguments`] holds the raw values typed on the command line (plain
//! integers, exactly as given). [`DecodeArguments::validate`] turns them into
//! a [`DecodeOptions`], the validated builder that the
//! [`DecodeDriver`](crate::DecodeDriver) consumes. Library users can skip the
//! raw form and build [`DecodeOptions`] directly.
//!
//! # Example
//!
//! ```no_run
//! use videodecode::{DecodeOptions, MemoryType, ResizeDimensions};
//!
//! let options = DecodeOptions::new("input.mp4")
//!     .with_output("frames.yuv")
//!     .with_memory_type(MemoryType::HostCopied)
//!     .with_resize(ResizeDimensions::new(640, 360));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DecodeError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Where decoded surfaces live once the session hands them out.
///
/// The numeric values match the `--mem_type` command-line flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryType {
    /// The surface stays in the decoder's own reference-counted buffer.
    Internal = 0,
    /// Planes are copied out of the decoder into an owned buffer. This is
    /// the default.
    #[default]
    DeviceCopied = 1,
    /// Planes are copied into an owned host buffer.
    HostCopied = 2,
    /// Frames are decoded but never mapped; only surface metadata survives.
    NotMapped = 3,
}

impl MemoryType {
    /// Map a raw `--mem_type` value, clamping anything outside `0..=3` to
    /// [`MemoryType::Internal`].
    pub fn from_raw(value: i64) -> Self {
        match value {
            0 => MemoryType::Internal,
            1 => MemoryType::DeviceCopied,
            2 => MemoryType::HostCopied,
            3 => MemoryType::NotMapped,
            other => {
                log::warn!("mem_type {other} is out of range, using 0 (internal)");
                MemoryType::Internal
            }
        }
    }

    /// Whether decoded pixels are reachable from the surface at all.
    pub fn is_mapped(self) -> bool {
        self != MemoryType::NotMapped
    }
}

/// How a seek lands relative to the requested position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Decoding resumes at exactly the requested frame; frames between the
    /// preceding key frame and the target are decoded and dropped.
    ExactFrame = 0,
    /// Decoding resumes at the nearest key frame at or before the target.
    #[default]
    PreviousKeyFrame = 1,
}

impl SeekMode {
    /// Parse a raw `--seek_mode` value.
    pub fn from_raw(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(SeekMode::ExactFrame),
            1 => Ok(SeekMode::PreviousKeyFrame),
            other => Err(DecodeError::InvalidSeekMode(other)),
        }
    }
}

/// How the seek value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekCriteria {
    /// The value is a zero-based frame number.
    #[default]
    FrameNumber = 0,
    /// The value is a presentation time in whole seconds.
    Timestamp = 1,
}

impl SeekCriteria {
    /// Parse a raw `--seek_criteria` value.
    pub fn from_raw(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(SeekCriteria::FrameNumber),
            1 => Ok(SeekCriteria::Timestamp),
            other => Err(DecodeError::InvalidSeekCriteria(other)),
        }
    }
}

/// A single seek performed before sequential decoding starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    /// Frame number or seconds, depending on `criteria`.
    pub value: u64,
    /// Where decoding resumes.
    pub mode: SeekMode,
    /// How `value` is interpreted.
    pub criteria: SeekCriteria,
}

/// Crop rectangle in source pixel coordinates.
///
/// `right` and `bottom` are exclusive, so a rectangle of
/// `(0, 0, width, height)` keeps the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    /// First column kept.
    pub left: u32,
    /// First row kept.
    pub top: u32,
    /// One past the last column kept.
    pub right: u32,
    /// One past the last row kept.
    pub bottom: u32,
}

impl CropRect {
    /// Build a crop rectangle, rejecting empty or inverted rectangles.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self, DecodeError> {
        if right <= left || bottom <= top {
            return Err(DecodeError::InvalidCrop(format!(
                "({left}, {top}, {right}, {bottom}) is empty; right must exceed left and bottom must exceed top"
            )));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Width of the cropped area.
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Height of the cropped area.
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Target size of the resize stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeDimensions {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl ResizeDimensions {
    /// Create target dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resizing is disabled when either dimension is zero.
    pub fn normalize(dimensions: Option<Self>) -> Option<Self> {
        dimensions.filter(|d| d.width > 0 && d.height > 0)
    }
}

/// Raw, unvalidated decode arguments as typed on the command line.
#[derive(Debug, Clone)]
pub struct DecodeArguments {
    /// Input media file.
    pub input: PathBuf,
    /// Output raw-frame file. `None` runs in benchmark mode.
    pub output: Option<PathBuf>,
    /// Decode device index.
    pub device: i32,
    /// Output surface memory type, `0..=3`.
    pub mem_type: i64,
    /// Crop rectangle as `left, top, right, bottom`.
    pub crop: Option<[i64; 4]>,
    /// Seek target; `-1` (or any value `<= 0`) means no seek.
    pub seek: i64,
    /// Seek mode, `0` or `1`.
    pub seek_mode: i64,
    /// Seek criteria, `0` or `1`.
    pub seek_criteria: i64,
    /// Resize target as `width, height`.
    pub resize: Option<[u32; 2]>,
    /// Convert output frames to packed RGB24.
    pub rgb: bool,
}

impl DecodeArguments {
    /// Arguments with the command-line defaults for everything but the input.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            device: 0,
            mem_type: MemoryType::DeviceCopied as i64,
            crop: None,
            seek: -1,
            seek_mode: SeekMode::PreviousKeyFrame as i64,
            seek_criteria: SeekCriteria::FrameNumber as i64,
            resize: None,
            rgb: false,
        }
    }

    /// Validate and convert into [`DecodeOptions`].
    ///
    /// Seek mode and criteria are only checked when a seek will actually
    /// happen (`seek > 0`). An out-of-range `mem_type` is clamped rather than
    /// rejected. The input path is checked last.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidSeekMode`] / [`DecodeError::InvalidSeekCriteria`]
    /// - [`DecodeError::InvalidCrop`] for negative or empty rectangles
    /// - [`DecodeError::InputNotFound`] if the input path does not exist
    pub fn validate(self) -> Result<DecodeOptions, DecodeError> {
        let seek = if self.seek > 0 {
            Some(SeekRequest {
                value: self.seek as u64,
                mode: SeekMode::from_raw(self.seek_mode)?,
                criteria: SeekCriteria::from_raw(self.seek_criteria)?,
            })
        } else {
            None
        };

        let memory_type = MemoryType::from_raw(self.mem_type);

        let crop = match self.crop {
            None | Some([0, 0, 0, 0]) => None,
            Some(values) => {
                let [left, top, right, bottom] = values.map(|value| u32::try_from(value).ok());
                match (left, top, right, bottom) {
                    (Some(left), Some(top), Some(right), Some(bottom)) => {
                        Some(CropRect::new(left, top, right, bottom)?)
                    }
                    _ => {
                        return Err(DecodeError::InvalidCrop(format!(
                            "{values:?} contains a negative or oversized coordinate"
                        )));
                    }
                }
            }
        };

        let resize = ResizeDimensions::normalize(
            self.resize
                .map(|[width, height]| ResizeDimensions::new(width, height)),
        );

        if !self.input.exists() {
            return Err(DecodeError::InputNotFound { path: self.input });
        }

        let mut options = DecodeOptions::new(self.input)
            .with_device(self.device)
            .with_memory_type(memory_type);
        options.output = self.output;
        options.crop = crop;
        options.seek = seek;
        options.resize = resize;
        options.rgb = self.rgb;
        Ok(options)
    }
}

/// Validated options for one decode run.
#[derive(Clone)]
pub struct DecodeOptions {
    pub(crate) input: PathBuf,
    pub(crate) output: Option<PathBuf>,
    pub(crate) device_id: i32,
    pub(crate) memory_type: MemoryType,
    pub(crate) crop: Option<CropRect>,
    pub(crate) seek: Option<SeekRequest>,
    pub(crate) resize: Option<ResizeDimensions>,
    pub(crate) rgb: bool,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) progress_interval: u64,
}

impl Debug for DecodeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodeOptions")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("device_id", &self.device_id)
            .field("memory_type", &self.memory_type)
            .field("crop", &self.crop)
            .field("seek", &self.seek)
            .field("resize", &self.resize)
            .field("rgb", &self.rgb)
            .field("progress_interval", &self.progress_interval)
            .finish_non_exhaustive()
    }
}

impl DecodeOptions {
    /// Options for decoding `input` in benchmark mode with default settings.
    ///
    /// Defaults: device 0, [`MemoryType::DeviceCopied`], no crop, no seek,
    /// no resize, no RGB conversion, no progress callback.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            device_id: 0,
            memory_type: MemoryType::default(),
            crop: None,
            seek: None,
            resize: None,
            rgb: false,
            progress: Arc::new(NoOpProgress),
            progress_interval: 1,
        }
    }

    /// Save every decoded (or resized) frame to `path` as raw planar data.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Select the decode device.
    #[must_use]
    pub fn with_device(mut self, device_id: i32) -> Self {
        self.device_id = device_id;
        self
    }

    /// Select where decoded surfaces are kept.
    #[must_use]
    pub fn with_memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Crop every decoded frame.
    #[must_use]
    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Seek once before sequential decoding starts.
    #[must_use]
    pub fn with_seek(mut self, seek: SeekRequest) -> Self {
        self.seek = Some(seek);
        self
    }

    /// Resize every decoded frame. Zero dimensions disable resizing.
    #[must_use]
    pub fn with_resize(mut self, dimensions: ResizeDimensions) -> Self {
        self.resize = ResizeDimensions::normalize(Some(dimensions));
        self
    }

    /// Convert every output frame (after crop and resize) to packed RGB24.
    #[must_use]
    pub fn with_rgb(mut self, rgb: bool) -> Self {
        self.rgb = rgb;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Fire the progress callback every `interval` frames (minimum 1).
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Input media file.
    pub fn input(&self) -> &PathBuf {
        &self.input
    }

    /// Output raw-frame file, `None` in benchmark mode.
    pub fn output(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }

    /// Selected decode device.
    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    /// Selected surface memory type.
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Crop rectangle, if any.
    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// Pending seek, if any.
    pub fn seek(&self) -> Option<SeekRequest> {
        self.seek
    }

    /// Resize target, if resizing is enabled.
    pub fn resize(&self) -> Option<ResizeDimensions> {
        self.resize
    }

    /// Whether output frames are converted to RGB24.
    pub fn rgb(&self) -> bool {
        self.rgb
    }

    /// `true` when no output file is set.
    pub fn is_benchmark(&self) -> bool {
        self.output.is_none()
    }
}
