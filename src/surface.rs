//! Decoded surfaces.
//!
//! A surface is one decoded (or post-processed) picture plus the layout
//! information needed to write it out. [`SurfaceInfo`] describes the
//! geometry, [`DecodedFrame`] is what the decode session hands out, and the
//! [`Surface`] trait lets sinks treat decoded and resized frames alike.
//!
//! Raw output is always *tightly packed*: each plane's rows are written back
//! to back with the decoder's stride padding removed, planes in FFmpeg order
//! (Y, then U and V, or the interleaved UV plane for semi-planar formats).

use std::borrow::Cow;

use ffmpeg_next::{format::Pixel, frame::Video as VideoFrame};
use ffmpeg_sys_next::AVPixelFormat;

use crate::configuration::MemoryType;
use crate::error::DecodeError;

/// Coarse classification of the decoded pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    /// 8-bit 4:2:0, Y plane plus interleaved UV plane.
    Nv12,
    /// 16-bit-container 4:2:0 semi-planar (P010 / P016).
    P016,
    /// 8-bit 4:2:0 planar.
    Yuv420,
    /// High bit depth 4:2:0 planar, 16-bit little-endian samples.
    Yuv420P16,
    /// 8-bit 4:2:2 planar.
    Yuv422,
    /// High bit depth 4:2:2 planar.
    Yuv422P16,
    /// 8-bit 4:4:4 planar.
    Yuv444,
    /// High bit depth 4:4:4 planar.
    Yuv444P16,
    /// Luma only.
    Gray,
    /// Packed 8-bit RGB, one plane.
    Rgb24,
    /// Anything else FFmpeg may produce; still written plane by plane.
    Other,
}

impl SurfaceFormat {
    /// Classify an FFmpeg pixel format.
    pub fn from_pixel(pixel: Pixel) -> Self {
        match pixel {
            Pixel::NV12 => SurfaceFormat::Nv12,
            Pixel::P010LE | Pixel::P016LE => SurfaceFormat::P016,
            Pixel::YUV420P | Pixel::YUVJ420P => SurfaceFormat::Yuv420,
            Pixel::YUV420P10LE | Pixel::YUV420P12LE => SurfaceFormat::Yuv420P16,
            Pixel::YUV422P | Pixel::YUVJ422P => SurfaceFormat::Yuv422,
            Pixel::YUV422P10LE | Pixel::YUV422P12LE => SurfaceFormat::Yuv422P16,
            Pixel::YUV444P | Pixel::YUVJ444P => SurfaceFormat::Yuv444,
            Pixel::YUV444P10LE | Pixel::YUV444P12LE => SurfaceFormat::Yuv444P16,
            Pixel::GRAY8 | Pixel::GRAY10LE | Pixel::GRAY12LE => SurfaceFormat::Gray,
            Pixel::RGB24 => SurfaceFormat::Rgb24,
            _ => SurfaceFormat::Other,
        }
    }
}

/// Bytes per row and number of rows of one packed plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Bytes of pixel data per row, without padding.
    pub row_bytes: usize,
    /// Number of rows.
    pub rows: usize,
}

impl PlaneLayout {
    /// Packed size of the plane in bytes.
    pub fn size(&self) -> usize {
        self.row_bytes * self.rows
    }
}

/// Geometry and layout of an output surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    /// Visible width in pixels (after cropping).
    pub width: u32,
    /// Visible height in pixels (after cropping).
    pub height: u32,
    /// FFmpeg pixel format of the samples.
    pub pixel_format: Pixel,
    /// Classification of `pixel_format`.
    pub surface_format: SurfaceFormat,
    /// Bits per luma sample.
    pub bit_depth: u32,
    /// Bytes per luma sample (1 for 8-bit, 2 above).
    pub bytes_per_pixel: u32,
    /// Number of planes after the luma plane.
    pub num_chroma_planes: u32,
    /// Where the samples live.
    pub memory_type: MemoryType,
    /// Packed layout of each plane, in FFmpeg plane order.
    pub planes: Vec<PlaneLayout>,
}

impl SurfaceInfo {
    /// Describe a `width` × `height` surface in `pixel` format.
    pub(crate) fn describe(
        pixel: Pixel,
        width: u32,
        height: u32,
        memory_type: MemoryType,
    ) -> Result<Self, DecodeError> {
        let bit_depth = pixel_bit_depth(pixel).ok_or_else(|| {
            DecodeError::VideoDecodeError(format!("unknown pixel format {pixel:?}"))
        })?;
        let planes = plane_layouts(pixel, width, height)?;

        Ok(Self {
            width,
            height,
            pixel_format: pixel,
            surface_format: SurfaceFormat::from_pixel(pixel),
            bit_depth,
            bytes_per_pixel: if bit_depth > 8 { 2 } else { 1 },
            num_chroma_planes: planes.len().saturating_sub(1) as u32,
            memory_type,
            planes,
        })
    }

    /// Size of the tightly packed surface in bytes.
    pub fn surface_size_in_bytes(&self) -> usize {
        self.planes.iter().map(PlaneLayout::size).sum()
    }

    /// Whether two surfaces share dimensions and pixel format.
    pub fn same_geometry(&self, other: &SurfaceInfo) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.pixel_format == other.pixel_format
    }
}

/// Common view over anything a sink can write.
pub trait Surface {
    /// Layout of the surface.
    fn surface_info(&self) -> &SurfaceInfo;

    /// Tightly packed planes, or `None` if the pixels are not mapped.
    fn packed_bytes(&self) -> Option<Cow<'_, [u8]>>;

    /// Bytes one frame of this surface occupies in raw output.
    fn frame_size(&self) -> usize {
        self.surface_info().surface_size_in_bytes()
    }
}

enum FrameStorage {
    /// The decoder's own reference-counted frame.
    Internal(VideoFrame),
    /// Planes copied out of the decoder.
    Packed(Vec<u8>),
    /// Metadata only.
    Unmapped,
}

/// A frame handed out by the [`DecodeSession`](crate::DecodeSession).
///
/// Dropping the frame releases it; with [`MemoryType::Internal`] this
/// returns the buffer to the decoder's pool.
pub struct DecodedFrame {
    pts: Option<i64>,
    key_frame: bool,
    info: SurfaceInfo,
    storage: FrameStorage,
}

impl DecodedFrame {
    /// Wrap a decoder frame according to `info.memory_type`.
    pub(crate) fn from_decoder(frame: VideoFrame, info: SurfaceInfo) -> Self {
        let pts = frame.timestamp().or_else(|| frame.pts());
        let key_frame = frame.is_key();
        let storage = match info.memory_type {
            MemoryType::Internal => FrameStorage::Internal(frame),
            MemoryType::DeviceCopied | MemoryType::HostCopied => {
                FrameStorage::Packed(pack_frame(&frame, &info.planes))
            }
            MemoryType::NotMapped => FrameStorage::Unmapped,
        };

        Self {
            pts,
            key_frame,
            info,
            storage,
        }
    }

    /// Presentation timestamp in stream time base.
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    /// Whether the decoder flagged this picture as a key frame.
    pub fn is_key_frame(&self) -> bool {
        self.key_frame
    }

    /// Whether pixel data can be read from this frame.
    pub fn is_mapped(&self) -> bool {
        !matches!(self.storage, FrameStorage::Unmapped)
    }

    /// Run `f` against an FFmpeg frame holding this surface's pixels.
    ///
    /// Internal frames are borrowed directly; copied frames are unpacked
    /// into a fresh frame first. Returns `None` for unmapped frames.
    pub(crate) fn with_video_frame<R>(
        &self,
        f: impl FnOnce(&VideoFrame) -> R,
    ) -> Option<R> {
        match &self.storage {
            FrameStorage::Internal(frame) => Some(f(frame)),
            FrameStorage::Packed(bytes) => {
                let mut frame =
                    VideoFrame::new(self.info.pixel_format, self.info.width, self.info.height);
                unpack_frame(bytes, &self.info.planes, &mut frame);
                Some(f(&frame))
            }
            FrameStorage::Unmapped => None,
        }
    }
}

impl Surface for DecodedFrame {
    fn surface_info(&self) -> &SurfaceInfo {
        &self.info
    }

    fn packed_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match &self.storage {
            FrameStorage::Internal(frame) => Some(Cow::Owned(pack_frame(frame, &self.info.planes))),
            FrameStorage::Packed(bytes) => Some(Cow::Borrowed(bytes)),
            FrameStorage::Unmapped => None,
        }
    }
}

/// Bits per luma sample of `pixel`, `None` for unknown formats.
pub(crate) fn pixel_bit_depth(pixel: Pixel) -> Option<u32> {
    if pixel == Pixel::None {
        return None;
    }
    let descriptor = unsafe { ffmpeg_sys_next::av_pix_fmt_desc_get(AVPixelFormat::from(pixel)) };
    if descriptor.is_null() {
        return None;
    }
    let depth = unsafe { (*descriptor).comp[0].depth };
    u32::try_from(depth).ok().filter(|&d| d > 0)
}

/// Packed layout of every plane of a `width` × `height` image.
pub(crate) fn plane_layouts(
    pixel: Pixel,
    width: u32,
    height: u32,
) -> Result<Vec<PlaneLayout>, DecodeError> {
    let format = AVPixelFormat::from(pixel);
    let descriptor = unsafe { ffmpeg_sys_next::av_pix_fmt_desc_get(format) };
    let plane_count = unsafe { ffmpeg_sys_next::av_pix_fmt_count_planes(format) };
    if descriptor.is_null() || plane_count <= 0 {
        return Err(DecodeError::VideoDecodeError(format!(
            "pixel format {pixel:?} has no plane layout"
        )));
    }
    let log2_chroma_h = unsafe { (*descriptor).log2_chroma_h } as u32;
    let chroma_rows = (height + (1 << log2_chroma_h) - 1) >> log2_chroma_h;

    (0..plane_count)
        .map(|plane| {
            let row_bytes =
                unsafe { ffmpeg_sys_next::av_image_get_linesize(format, width as i32, plane) };
            if row_bytes < 0 {
                return Err(DecodeError::VideoDecodeError(format!(
                    "cannot compute row size of plane {plane} for {pixel:?} at width {width}"
                )));
            }
            let rows = if plane == 1 || plane == 2 { chroma_rows } else { height };
            Ok(PlaneLayout {
                row_bytes: row_bytes as usize,
                rows: rows as usize,
            })
        })
        .collect()
}

/// Copy the planes of `frame` into one tightly packed buffer.
pub(crate) fn pack_frame(frame: &VideoFrame, planes: &[PlaneLayout]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(planes.iter().map(PlaneLayout::size).sum());

    for (index, plane) in planes.iter().enumerate() {
        let stride = frame.stride(index);
        let data = frame.data(index);

        if stride == plane.row_bytes {
            buffer.extend_from_slice(&data[..plane.size()]);
        } else {
            for row in 0..plane.rows {
                let row_start = row * stride;
                buffer.extend_from_slice(&data[row_start..row_start + plane.row_bytes]);
            }
        }
    }

    buffer
}

/// Inverse of [`pack_frame`]: spread packed planes into an allocated frame.
pub(crate) fn unpack_frame(bytes: &[u8], planes: &[PlaneLayout], frame: &mut VideoFrame) {
    let mut offset = 0;

    for (index, plane) in planes.iter().enumerate() {
        let stride = frame.stride(index);
        let data = frame.data_mut(index);

        for row in 0..plane.rows {
            let source = &bytes[offset..offset + plane.row_bytes];
            data[row * stride..row * stride + plane.row_bytes].copy_from_slice(source);
            offset += plane.row_bytes;
        }
    }
}
