//! Resize post-processing.
//!
//! [`Resizer`] scales decoded surfaces to a fixed size with FFmpeg's
//! software scaler, keeping the source pixel format. The scaler context is
//! cached and only rebuilt when the source geometry or target changes.

use std::borrow::Cow;

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    configuration::ResizeDimensions,
    error::DecodeError,
    surface::{DecodedFrame, Surface, SurfaceInfo, pack_frame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    format: Pixel,
    source_width: u32,
    source_height: u32,
    target: ResizeDimensions,
}

/// A surface produced by the [`Resizer`].
pub struct ResizedFrame {
    info: SurfaceInfo,
    frame: VideoFrame,
}

impl ResizedFrame {
    /// Layout of the resized surface.
    pub fn surface_info(&self) -> &SurfaceInfo {
        &self.info
    }

    pub(crate) fn video_frame(&self) -> &VideoFrame {
        &self.frame
    }
}

impl Surface for ResizedFrame {
    fn surface_info(&self) -> &SurfaceInfo {
        &self.info
    }

    fn packed_bytes(&self) -> Option<Cow<'_, [u8]>> {
        Some(Cow::Owned(pack_frame(&self.frame, &self.info.planes)))
    }
}

/// Scales surfaces to a target size.
#[derive(Default)]
pub struct Resizer {
    scaler: Option<(ScalerKey, ScalingContext)>,
    frames_resized: u64,
}

impl Resizer {
    /// Create a resizer with no scaler configured yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames resized so far.
    pub fn frames_resized(&self) -> u64 {
        self.frames_resized
    }

    /// Scale `frame` to `target`.
    ///
    /// Returns `Ok(None)` when the frame has no mapped pixels or is already
    /// `target` sized; the caller then uses the original surface.
    pub fn resize(
        &mut self,
        frame: &DecodedFrame,
        target: ResizeDimensions,
    ) -> Result<Option<ResizedFrame>, DecodeError> {
        let source = frame.surface_info();
        if !frame.is_mapped() || (source.width == target.width && source.height == target.height)
        {
            return Ok(None);
        }

        let key = ScalerKey {
            format: source.pixel_format,
            source_width: source.width,
            source_height: source.height,
            target,
        };
        if self.scaler.as_ref().map(|(cached, _)| *cached) != Some(key) {
            let scaler = ScalingContext::get(
                key.format,
                key.source_width,
                key.source_height,
                key.format,
                target.width,
                target.height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| {
                DecodeError::ResizeError(format!(
                    "cannot scale {:?} {}x{} to {}x{}: {error}",
                    key.format, key.source_width, key.source_height, target.width, target.height
                ))
            })?;
            log::debug!(
                "Configured scaler {}x{} -> {}x{} ({:?})",
                key.source_width,
                key.source_height,
                target.width,
                target.height,
                key.format
            );
            self.scaler = Some((key, scaler));
        }

        let Some((_, scaler)) = self.scaler.as_mut() else {
            return Ok(None);
        };
        let scaled = frame.with_video_frame(|input| {
            let mut output = VideoFrame::empty();
            scaler.run(input, &mut output).map(|()| output)
        });
        let output = match scaled {
            None => return Ok(None),
            Some(result) => result.map_err(|error| DecodeError::ResizeError(error.to_string()))?,
        };

        let info = SurfaceInfo::describe(
            source.pixel_format,
            target.width,
            target.height,
            source.memory_type,
        )?;
        self.frames_resized += 1;

        Ok(Some(ResizedFrame {
            info,
            frame: output,
        }))
    }
}
