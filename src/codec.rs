//! Codec capability registry.
//!
//! Maps the codec identifier reported by the container onto the set of
//! codecs the driver knows how to decode, and answers whether a codec at a
//! given bit depth can be decoded on a device.
//!
//! # Example
//!
//! ```no_run
//! use videodecode::{CodecId, CodecRegistry, Demuxer};
//!
//! let demuxer = Demuxer::open("input.mp4")?;
//! let registry = CodecRegistry::software();
//! let supported = CodecId::from_ffmpeg(demuxer.codec_id())
//!     .is_some_and(|codec| registry.is_codec_supported(0, codec, demuxer.bit_depth()));
//! # Ok::<(), videodecode::DecodeError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::codec::Id;

use crate::device::DeviceInfo;

/// Video codecs the driver can route to a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// MPEG-1 Part 2.
    Mpeg1,
    /// MPEG-2 Part 2 / H.262.
    Mpeg2,
    /// MPEG-4 Part 2.
    Mpeg4,
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    Hevc,
    /// AOMedia Video 1.
    Av1,
    /// VP8.
    Vp8,
    /// VP9.
    Vp9,
    /// Motion JPEG.
    Jpeg,
}

impl CodecId {
    /// Map an FFmpeg codec identifier. Returns `None` for codecs the driver
    /// does not route.
    pub fn from_ffmpeg(id: Id) -> Option<Self> {
        match id {
            Id::MPEG1VIDEO => Some(CodecId::Mpeg1),
            Id::MPEG2VIDEO => Some(CodecId::Mpeg2),
            Id::MPEG4 => Some(CodecId::Mpeg4),
            Id::H264 => Some(CodecId::H264),
            Id::HEVC => Some(CodecId::Hevc),
            Id::AV1 => Some(CodecId::Av1),
            Id::VP8 => Some(CodecId::Vp8),
            Id::VP9 => Some(CodecId::Vp9),
            Id::MJPEG => Some(CodecId::Jpeg),
            _ => None,
        }
    }

    /// The matching FFmpeg codec identifier.
    pub fn to_ffmpeg(self) -> Id {
        match self {
            CodecId::Mpeg1 => Id::MPEG1VIDEO,
            CodecId::Mpeg2 => Id::MPEG2VIDEO,
            CodecId::Mpeg4 => Id::MPEG4,
            CodecId::H264 => Id::H264,
            CodecId::Hevc => Id::HEVC,
            CodecId::Av1 => Id::AV1,
            CodecId::Vp8 => Id::VP8,
            CodecId::Vp9 => Id::VP9,
            CodecId::Jpeg => Id::MJPEG,
        }
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Mpeg1 => "MPEG-1",
            CodecId::Mpeg2 => "MPEG-2",
            CodecId::Mpeg4 => "MPEG-4",
            CodecId::H264 => "H.264",
            CodecId::Hevc => "HEVC",
            CodecId::Av1 => "AV1",
            CodecId::Vp8 => "VP8",
            CodecId::Vp9 => "VP9",
            CodecId::Jpeg => "JPEG",
        }
    }
}

impl Display for CodecId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCapability {
    /// The codec.
    pub codec: CodecId,
    /// Luma bit depths the backend decodes for this codec.
    pub bit_depths: &'static [u32],
}

/// Which codecs, at which bit depths, a backend decodes.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    capabilities: Vec<CodecCapability>,
}

impl CodecRegistry {
    /// Capabilities of the FFmpeg software backend.
    pub fn software() -> Self {
        let capabilities = vec![
            CodecCapability {
                codec: CodecId::Mpeg1,
                bit_depths: &[8],
            },
            CodecCapability {
                codec: CodecId::Mpeg2,
                bit_depths: &[8],
            },
            CodecCapability {
                codec: CodecId::Mpeg4,
                bit_depths: &[8],
            },
            CodecCapability {
                codec: CodecId::H264,
                bit_depths: &[8, 10],
            },
            CodecCapability {
                codec: CodecId::Hevc,
                bit_depths: &[8, 10, 12],
            },
            CodecCapability {
                codec: CodecId::Av1,
                bit_depths: &[8, 10, 12],
            },
            CodecCapability {
                codec: CodecId::Vp8,
                bit_depths: &[8],
            },
            CodecCapability {
                codec: CodecId::Vp9,
                bit_depths: &[8, 10, 12],
            },
            CodecCapability {
                codec: CodecId::Jpeg,
                bit_depths: &[8, 12],
            },
        ];
        Self { capabilities }
    }

    /// Every codec in the table.
    pub fn supported_codecs(&self) -> &[CodecCapability] {
        &self.capabilities
    }

    /// Look up the table row for `codec`.
    pub fn capability(&self, codec: CodecId) -> Option<&CodecCapability> {
        self.capabilities.iter().find(|entry| entry.codec == codec)
    }

    /// Whether `codec` at `bit_depth` can be decoded on `device_id`.
    ///
    /// Also requires that the linked FFmpeg build carries a decoder for the
    /// codec, since distributions routinely strip some.
    pub fn is_codec_supported(&self, device_id: i32, codec: CodecId, bit_depth: u32) -> bool {
        if DeviceInfo::query(device_id).is_err() {
            return false;
        }

        let in_table = self
            .capability(codec)
            .is_some_and(|entry| entry.bit_depths.contains(&bit_depth));
        if !in_table {
            log::debug!("{codec} at {bit_depth}-bit is outside the capability table");
            return false;
        }

        let available = ffmpeg_next::decoder::find(codec.to_ffmpeg()).is_some();
        if !available {
            log::debug!("FFmpeg build has no decoder for {codec}");
        }
        available
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::software()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_ids_map_both_ways() {
        for entry in CodecRegistry::software().supported_codecs() {
            assert_eq!(CodecId::from_ffmpeg(entry.codec.to_ffmpeg()), Some(entry.codec));
        }
        assert_eq!(CodecId::from_ffmpeg(Id::PRORES), None);
    }

    #[test]
    fn bit_depth_limits_come_from_the_table() {
        let registry = CodecRegistry::software();
        assert!(!registry.is_codec_supported(0, CodecId::H264, 12));
        assert!(!registry.is_codec_supported(0, CodecId::Vp8, 10));
    }

    #[test]
    fn unknown_device_supports_nothing() {
        let registry = CodecRegistry::software();
        assert!(!registry.is_codec_supported(3, CodecId::H264, 8));
    }
}
