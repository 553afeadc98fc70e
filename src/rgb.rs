//! RGB output stage.
//!
//! [`RgbConverter`] turns decoded (or resized) surfaces into packed RGB24
//! at the same size, using FFmpeg's software scaler. It runs after crop and
//! resize, so what it sees is exactly what would otherwise be written.
//!
//! # Example
//!
//! ```no_run
//! use videodecode::{CodecId, DecodeSession, Demuxer, RgbConverter, SessionOptions, Surface};
//!
//! let mut demuxer = Demuxer::open("input.mp4")?;
//! let mut session = DecodeSession::new(&demuxer, SessionOptions::new(CodecId::H264))?;
//! let mut converter = RgbConverter::new();
//!
//! let packet = demuxer.demux_frame()?;
//! session.decode_frame(&packet)?;
//! if let Some(frame) = session.next_frame() {
//!     if let Some(rgb) = converter.convert(&frame)? {
//!         println!("{} bytes of RGB", rgb.frame_size());
//!     }
//! }
//! # Ok::<(), videodecode::DecodeError>(())
//! ```

use std::borrow::Cow;

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    error::DecodeError,
    resize::ResizedFrame,
    surface::{DecodedFrame, Surface, SurfaceInfo, pack_frame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConverterKey {
    format: Pixel,
    width: u32,
    height: u32,
}

/// A packed RGB24 surface produced by the [`RgbConverter`].
pub struct RgbFrame {
    info: SurfaceInfo,
    frame: VideoFrame,
}

impl Surface for RgbFrame {
    fn surface_info(&self) -> &SurfaceInfo {
        &self.info
    }

    fn packed_bytes(&self) -> Option<Cow<'_, [u8]>> {
        Some(Cow::Owned(pack_frame(&self.frame, &self.info.planes)))
    }
}

/// Converts surfaces to RGB24.
#[derive(Default)]
pub struct RgbConverter {
    scaler: Option<(ConverterKey, ScalingContext)>,
    frames_converted: u64,
}

impl RgbConverter {
    /// Create a converter with no scaler configured yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames converted so far.
    pub fn frames_converted(&self) -> u64 {
        self.frames_converted
    }

    /// Convert a decoded frame. Returns `Ok(None)` when it has no mapped pixels.
    pub fn convert(&mut self, frame: &DecodedFrame) -> Result<Option<RgbFrame>, DecodeError> {
        let source = frame.surface_info();
        frame
            .with_video_frame(|input| self.convert_video(input, source))
            .transpose()
    }

    /// Convert a frame that went through the [`Resizer`](crate::Resizer).
    pub fn convert_resized(&mut self, frame: &ResizedFrame) -> Result<RgbFrame, DecodeError> {
        self.convert_video(frame.video_frame(), frame.surface_info())
    }

    fn convert_video(
        &mut self,
        input: &VideoFrame,
        source: &SurfaceInfo,
    ) -> Result<RgbFrame, DecodeError> {
        let key = ConverterKey {
            format: source.pixel_format,
            width: source.width,
            height: source.height,
        };
        if self.scaler.as_ref().map(|(cached, _)| *cached) != Some(key) {
            let scaler = ScalingContext::get(
                key.format,
                key.width,
                key.height,
                Pixel::RGB24,
                key.width,
                key.height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| {
                DecodeError::RgbConversionError(format!(
                    "cannot convert {:?} {}x{}: {error}",
                    key.format, key.width, key.height
                ))
            })?;
            log::debug!(
                "Configured RGB converter for {}x{} {:?}",
                key.width,
                key.height,
                key.format
            );
            self.scaler = Some((key, scaler));
        }

        let Some((_, scaler)) = self.scaler.as_mut() else {
            return Err(DecodeError::RgbConversionError("converter is not configured".to_string()));
        };
        let mut output = VideoFrame::empty();
        scaler
            .run(input, &mut output)
            .map_err(|error| DecodeError::RgbConversionError(error.to_string()))?;

        let info = SurfaceInfo::describe(
            Pixel::RGB24,
            source.width,
            source.height,
            source.memory_type,
        )?;
        self.frames_converted += 1;

        Ok(RgbFrame {
            info,
            frame: output,
        })
    }
}
