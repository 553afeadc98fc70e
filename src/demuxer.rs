//! Container demuxing.
//!
//! [`Demuxer`] opens a media file, picks its best video stream and yields the
//! stream's compressed packets in file order. It also resolves seek requests
//! (by frame number or by seconds) to the nearest preceding key frame.
//!
//! # Example
//!
//! ```no_run
//! use videodecode::Demuxer;
//!
//! let mut demuxer = Demuxer::open("input.mp4")?;
//! loop {
//!     let packet = demuxer.demux_frame()?;
//!     if packet.end_of_stream {
//!         break;
//!     }
//!     println!("pts={:?} key={} size={}", packet.pts, packet.is_key_frame, packet.bitstream_size);
//! }
//! # Ok::<(), videodecode::DecodeError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::{Id, Parameters, context::Context as CodecContext},
    format::{Pixel, context::Input},
    media::Type,
};

use crate::{
    configuration::{SeekCriteria, SeekMode, SeekRequest},
    conversion,
    error::DecodeError,
    surface::pixel_bit_depth,
};

/// Cached description of the selected video stream.
#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    /// Index of the stream inside the container.
    pub stream_index: usize,
    /// FFmpeg codec identifier.
    pub codec_id: Id,
    /// Codec name as FFmpeg reports it.
    pub codec_name: String,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Pixel format the decoder will produce, if known before decoding.
    pub pixel_format: Pixel,
    /// Bits per luma sample.
    pub bit_depth: u32,
    /// Average frame rate, `0.0` when the container does not say.
    pub frames_per_second: f64,
    /// Time base of packet and frame timestamps.
    pub time_base: Rational,
    /// First timestamp of the stream, in `time_base`.
    pub start_time: i64,
    /// Estimated number of frames (container count, else duration × rate).
    pub frame_count: u64,
    /// Stream duration.
    pub duration: Duration,
    /// Short name of the container format.
    pub container_format: String,
}

impl VideoStreamInfo {
    /// Stream timestamp that `request` resolves to, offset by the start time.
    ///
    /// Targets beyond the representable range saturate at `i64::MAX`.
    pub fn seek_target(&self, request: &SeekRequest) -> i64 {
        let offset = match request.criteria {
            SeekCriteria::FrameNumber => {
                if self.frames_per_second <= 0.0 {
                    log::warn!(
                        "Stream has no frame rate; seeking to frame {} lands at the start",
                        request.value
                    );
                }
                conversion::frame_number_to_stream_timestamp(
                    request.value,
                    self.frames_per_second,
                    self.time_base,
                )
            }
            SeekCriteria::Timestamp => {
                conversion::seconds_to_stream_timestamp(request.value as f64, self.time_base)
            }
        };
        self.start_time.saturating_add(offset)
    }
}

/// Position a packet was demuxed from after a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekMarker {
    /// Requested position, in stream time base.
    pub target_pts: i64,
    /// How decoding should resume.
    pub mode: SeekMode,
}

/// One compressed packet of the video stream.
pub struct DemuxedPacket {
    packet: Packet,
    /// Stream the packet belongs to.
    pub stream_index: usize,
    /// Presentation timestamp, if present.
    pub pts: Option<i64>,
    /// Decoding timestamp, if present.
    pub dts: Option<i64>,
    /// Whether the packet starts a key frame.
    pub is_key_frame: bool,
    /// Payload size in bytes; `0` only at end of stream.
    pub bitstream_size: usize,
    /// `true` once the container is exhausted.
    pub end_of_stream: bool,
    /// Set on the first packet after a seek.
    pub seek: Option<SeekMarker>,
}

impl Debug for DemuxedPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DemuxedPacket")
            .field("stream_index", &self.stream_index)
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("is_key_frame", &self.is_key_frame)
            .field("bitstream_size", &self.bitstream_size)
            .field("end_of_stream", &self.end_of_stream)
            .field("seek", &self.seek)
            .finish_non_exhaustive()
    }
}

impl DemuxedPacket {
    fn from_packet(packet: Packet, stream_index: usize) -> Self {
        Self {
            stream_index,
            pts: packet.pts(),
            dts: packet.dts(),
            is_key_frame: packet.is_key(),
            bitstream_size: packet.size(),
            end_of_stream: false,
            seek: None,
            packet,
        }
    }

    fn end_of_stream(stream_index: usize) -> Self {
        Self {
            packet: Packet::empty(),
            stream_index,
            pts: None,
            dts: None,
            is_key_frame: false,
            bitstream_size: 0,
            end_of_stream: true,
            seek: None,
        }
    }

    /// The FFmpeg packet to feed to the decoder.
    pub(crate) fn packet(&self) -> &Packet {
        &self.packet
    }
}

/// Reads compressed video packets from a container.
pub struct Demuxer {
    input: Input,
    path: PathBuf,
    info: VideoStreamInfo,
    exhausted: bool,
    packets_read: u64,
}

impl Debug for Demuxer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Demuxer")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("exhausted", &self.exhausted)
            .field("packets_read", &self.packets_read)
            .finish_non_exhaustive()
    }
}

impl Demuxer {
    /// Open `path` and select its best video stream.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::FileOpen`] if FFmpeg cannot open or probe the file.
    /// - [`DecodeError::NoVideoStream`] if there is no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening container: {}", path.display());

        crate::ffmpeg::initialize()?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| DecodeError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let info = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or(DecodeError::NoVideoStream)?;
            let stream_index = stream.index();
            let parameters = stream.parameters();
            let codec_id = parameters.id();
            let bits_per_raw_sample = unsafe { (*parameters.as_ptr()).bits_per_raw_sample };

            let decoder = CodecContext::from_parameters(parameters)
                .and_then(|context| context.decoder().video())
                .map_err(|error| DecodeError::FileOpen {
                    path: path.clone(),
                    reason: format!(
                        "Failed to read video codec parameters for stream {stream_index}: {error}"
                    ),
                })?;

            let pixel_format = decoder.format();
            let bit_depth = u32::try_from(bits_per_raw_sample)
                .ok()
                .filter(|&bits| bits > 0)
                .or_else(|| pixel_bit_depth(pixel_format))
                .unwrap_or(8);

            let time_base = stream.time_base();
            let frames_per_second = match conversion::frames_per_second(stream.avg_frame_rate()) {
                fps if fps > 0.0 => fps,
                _ => conversion::frames_per_second(stream.rate()),
            };

            let start_time = match stream.start_time() {
                ffmpeg_sys_next::AV_NOPTS_VALUE => 0,
                start => start,
            };

            let duration = if stream.duration() > 0 {
                Duration::from_secs_f64(conversion::pts_to_seconds(stream.duration(), time_base))
            } else if input.duration() > 0 {
                Duration::from_micros(input.duration() as u64)
            } else {
                Duration::ZERO
            };

            let frame_count = if stream.frames() > 0 {
                stream.frames() as u64
            } else {
                (duration.as_secs_f64() * frames_per_second) as u64
            };

            let codec_name = if codec_id.name().is_empty() {
                "unknown".to_string()
            } else {
                codec_id.name().to_string()
            };

            VideoStreamInfo {
                stream_index,
                codec_id,
                codec_name,
                width: decoder.width(),
                height: decoder.height(),
                pixel_format,
                bit_depth,
                frames_per_second,
                time_base,
                start_time,
                frame_count,
                duration,
                container_format: input.format().name().to_string(),
            }
        };

        log::info!(
            "Opened {} (format={}, codec={}, {}x{}, {}-bit, {:.2} fps, ~{} frames)",
            path.display(),
            info.container_format,
            info.codec_name,
            info.width,
            info.height,
            info.bit_depth,
            info.frames_per_second,
            info.frame_count,
        );

        Ok(Self {
            input,
            path,
            info,
            exhausted: false,
            packets_read: 0,
        })
    }

    /// Description of the selected video stream.
    pub fn stream_info(&self) -> &VideoStreamInfo {
        &self.info
    }

    /// FFmpeg codec identifier of the video stream.
    pub fn codec_id(&self) -> Id {
        self.info.codec_id
    }

    /// Bits per luma sample of the video stream.
    pub fn bit_depth(&self) -> u32 {
        self.info.bit_depth
    }

    /// Path the demuxer was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of video packets returned so far.
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Codec parameters of the video stream, for opening a decoder.
    pub fn codec_parameters(&self) -> Result<Parameters, DecodeError> {
        self.input
            .stream(self.info.stream_index)
            .map(|stream| stream.parameters())
            .ok_or(DecodeError::NoVideoStream)
    }

    /// Read the next video packet.
    ///
    /// Packets of other streams and empty packets are skipped. Once the
    /// container is exhausted this returns an end-of-stream packet with
    /// `bitstream_size == 0`, on this and every later call.
    pub fn demux_frame(&mut self) -> Result<DemuxedPacket, DecodeError> {
        let stream_index = self.info.stream_index;
        if self.exhausted {
            return Ok(DemuxedPacket::end_of_stream(stream_index));
        }

        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != stream_index || packet.size() == 0 {
                        continue;
                    }
                    self.packets_read += 1;
                    return Ok(DemuxedPacket::from_packet(packet, stream_index));
                }
                Err(FfmpegError::Eof) => {
                    log::debug!("End of container after {} video packets", self.packets_read);
                    self.exhausted = true;
                    return Ok(DemuxedPacket::end_of_stream(stream_index));
                }
                Err(error) => return Err(DecodeError::from(error)),
            }
        }
    }

    /// Seek, then return the first video packet at the new position.
    ///
    /// The container is positioned on the closest key frame at or before the
    /// target; the returned packet carries a [`SeekMarker`] so the decode
    /// session can drop pictures before the target in
    /// [`SeekMode::ExactFrame`].
    pub fn seek_frame(&mut self, request: &SeekRequest) -> Result<DemuxedPacket, DecodeError> {
        let time_base = self.info.time_base;
        let target_pts = self.info.seek_target(request);
        let seek_timestamp = conversion::stream_timestamp_to_seek_timestamp(target_pts, time_base);

        log::debug!(
            "Seeking to {:?} {} ({:?}): stream pts {target_pts}, container ts {seek_timestamp}",
            request.criteria,
            request.value,
            request.mode,
        );

        self.input.seek(seek_timestamp, ..seek_timestamp)?;
        self.exhausted = false;

        let mut packet = self.demux_frame()?;
        packet.seek = Some(SeekMarker {
            target_pts,
            mode: request.mode,
        });
        Ok(packet)
    }
}
