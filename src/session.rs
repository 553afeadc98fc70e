//! Decode session.
//!
//! A [`DecodeSession`] owns one FFmpeg video decoder and turns demuxed
//! packets into [`DecodedFrame`]s. It applies the crop rectangle, drops
//! pictures before an exact seek target, and detects mid-stream geometry
//! changes (reconfiguration).
//!
//! Frames are queued until the caller pulls them with
//! [`next_frame`](DecodeSession::next_frame). When the stream reconfigures,
//! frames of the old geometry still in the queue are *flushed*: counted, and
//! either kept for [`take_flushed_frames`](DecodeSession::take_flushed_frames)
//! or dropped, depending on [`ReconfigFlushMode`].

use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter, Result as FmtResult},
    time::{Duration, Instant},
};

use ffmpeg_next::{
    Error as FfmpegError,
    codec::{Parameters, context::Context as CodecContext, decoder::Video as VideoDecoder},
    frame::Video as VideoFrame,
};

use crate::{
    codec::CodecId,
    configuration::{CropRect, MemoryType, SeekMode},
    demuxer::{DemuxedPacket, Demuxer, SeekMarker},
    error::DecodeError,
    surface::{DecodedFrame, SurfaceInfo},
};

/// `AV_FRAME_CROP_UNALIGNED`: crop exactly, even if plane pointers end up
/// unaligned.
const CROP_UNALIGNED: i32 = 1;

/// What happens to frames flushed by a reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconfigFlushMode {
    /// Flushed frames are counted and released.
    #[default]
    Discard,
    /// Flushed frames are kept until the caller takes them for writing.
    DumpToFile,
}

/// Reconfiguration behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconfigParams {
    /// Fate of frames flushed by a reconfiguration.
    pub flush_mode: ReconfigFlushMode,
}

/// Settings a session is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Codec of the stream.
    pub codec: CodecId,
    /// Device the session decodes on.
    pub device_id: i32,
    /// Where decoded surfaces are kept.
    pub memory_type: MemoryType,
    /// Crop applied to every frame.
    pub crop: Option<CropRect>,
    /// Reconfiguration behavior.
    pub reconfig: ReconfigParams,
}

impl SessionOptions {
    /// Options with default memory type, no crop and discarding reconfiguration.
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            device_id: 0,
            memory_type: MemoryType::default(),
            crop: None,
            reconfig: ReconfigParams::default(),
        }
    }
}

/// Stateful decoder for one video stream.
pub struct DecodeSession {
    options: SessionOptions,
    parameters: Option<Parameters>,
    decoder: Option<VideoDecoder>,
    ready: VecDeque<DecodedFrame>,
    flushed: Vec<DecodedFrame>,
    num_flushed: u64,
    output_info: Option<SurfaceInfo>,
    discard_before: Option<i64>,
    frames_discarded: u64,
    eof_sent: bool,
    overheads: Vec<Duration>,
}

impl Debug for DecodeSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodeSession")
            .field("options", &self.options)
            .field("opened", &self.decoder.is_some())
            .field("queued", &self.ready.len())
            .field("num_flushed", &self.num_flushed)
            .field("output_info", &self.output_info)
            .field("discard_before", &self.discard_before)
            .field("eof_sent", &self.eof_sent)
            .field("overheads", &self.overheads)
            .finish_non_exhaustive()
    }
}

impl DecodeSession {
    /// Create a session for the video stream of `demuxer`.
    ///
    /// The FFmpeg decoder itself is opened on the first call to
    /// [`decode_frame`](DecodeSession::decode_frame).
    pub fn new(demuxer: &Demuxer, options: SessionOptions) -> Result<Self, DecodeError> {
        let parameters = demuxer.codec_parameters()?;
        log::debug!(
            "Created {} session on device {} (memory={:?}, crop={:?}, flush={:?})",
            options.codec,
            options.device_id,
            options.memory_type,
            options.crop,
            options.reconfig.flush_mode,
        );

        Ok(Self {
            options,
            parameters: Some(parameters),
            decoder: None,
            ready: VecDeque::new(),
            flushed: Vec::new(),
            num_flushed: 0,
            output_info: None,
            discard_before: None,
            frames_discarded: 0,
            eof_sent: false,
            overheads: Vec::new(),
        })
    }

    /// Settings the session was created with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Feed one packet and collect every frame it completes.
    ///
    /// An end-of-stream packet drains the decoder. Returns the number of
    /// frames ready for [`next_frame`](DecodeSession::next_frame).
    ///
    /// # Errors
    ///
    /// Fails if the decoder cannot be opened, rejects the packet for a
    /// reason other than corrupt data, or produces a frame that the crop
    /// rectangle does not fit.
    pub fn decode_frame(&mut self, packet: &DemuxedPacket) -> Result<usize, DecodeError> {
        self.ensure_open()?;

        if let Some(marker) = packet.seek {
            self.apply_seek(marker);
        }

        if packet.end_of_stream {
            if !self.eof_sent {
                self.eof_sent = true;
                self.send_eof()?;
                self.drain()?;
            }
        } else {
            self.send_packet(packet)?;
            self.drain()?;
        }

        Ok(self.ready.len())
    }

    /// Pop the oldest decoded frame. Dropping it releases the surface.
    pub fn next_frame(&mut self) -> Option<DecodedFrame> {
        self.ready.pop_front()
    }

    /// Layout of the current output surface, once a frame has been decoded.
    pub fn output_surface_info(&self) -> Option<&SurfaceInfo> {
        self.output_info.as_ref()
    }

    /// Frames flushed by reconfigurations so far.
    pub fn num_flushed_frames(&self) -> u64 {
        self.num_flushed
    }

    /// Take the flushed frames retained in [`ReconfigFlushMode::DumpToFile`].
    pub fn take_flushed_frames(&mut self) -> Vec<DecodedFrame> {
        std::mem::take(&mut self.flushed)
    }

    /// Frames dropped because they precede an exact seek target.
    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    /// Setup time of session `session_id`.
    ///
    /// Session 0 is the initial decoder open; each reconfiguration starts
    /// the next id.
    pub fn session_overhead(&self, session_id: usize) -> Option<Duration> {
        self.overheads.get(session_id).copied()
    }

    /// Setup time summed over all sessions.
    pub fn total_session_overhead(&self) -> Duration {
        self.overheads.iter().sum()
    }

    /// Number of mid-stream reconfigurations.
    pub fn reconfigure_count(&self) -> usize {
        self.overheads.len().saturating_sub(1)
    }

    fn ensure_open(&mut self) -> Result<(), DecodeError> {
        if self.decoder.is_some() {
            return Ok(());
        }
        let parameters = self.parameters.take().ok_or_else(|| {
            DecodeError::VideoDecodeError("decoder parameters already consumed".to_string())
        })?;

        let started = Instant::now();
        let decoder = CodecContext::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|error| {
                DecodeError::VideoDecodeError(format!(
                    "Failed to open {} decoder: {error}",
                    self.options.codec
                ))
            })?;
        let elapsed = started.elapsed();

        log::debug!("Opened {} decoder in {elapsed:?}", self.options.codec);
        self.overheads.push(elapsed);
        self.decoder = Some(decoder);
        Ok(())
    }

    fn apply_seek(&mut self, marker: SeekMarker) {
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.flush();
        }
        self.ready.clear();
        self.eof_sent = false;
        self.discard_before = (marker.mode == SeekMode::ExactFrame).then_some(marker.target_pts);
        log::debug!(
            "Decoder flushed for seek to pts {} ({:?})",
            marker.target_pts,
            marker.mode
        );
    }

    fn send_packet(&mut self, packet: &DemuxedPacket) -> Result<(), DecodeError> {
        loop {
            let Some(decoder) = self.decoder.as_mut() else {
                return Ok(());
            };
            match decoder.send_packet(packet.packet()) {
                Ok(()) => return Ok(()),
                Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                    if self.drain()? == 0 {
                        return Err(DecodeError::VideoDecodeError(
                            "decoder refused input without producing output".to_string(),
                        ));
                    }
                }
                Err(FfmpegError::InvalidData) => {
                    log::warn!(
                        "Skipping corrupt packet (pts={:?}, {} bytes)",
                        packet.pts,
                        packet.bitstream_size
                    );
                    return Ok(());
                }
                Err(error) => {
                    return Err(DecodeError::VideoDecodeError(format!(
                        "send_packet failed: {error}"
                    )));
                }
            }
        }
    }

    fn send_eof(&mut self) -> Result<(), DecodeError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(());
        };
        match decoder.send_eof() {
            Ok(()) | Err(FfmpegError::Eof) => Ok(()),
            Err(error) => Err(DecodeError::VideoDecodeError(format!(
                "send_eof failed: {error}"
            ))),
        }
    }

    /// Receive every frame the decoder has ready. Returns how many arrived.
    fn drain(&mut self) -> Result<usize, DecodeError> {
        let mut received = Vec::new();
        if let Some(decoder) = self.decoder.as_mut() {
            loop {
                let mut frame = VideoFrame::empty();
                match decoder.receive_frame(&mut frame) {
                    Ok(()) => received.push(frame),
                    Err(FfmpegError::Eof) => break,
                    Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                        break;
                    }
                    Err(FfmpegError::InvalidData) => {
                        log::warn!("Decoder dropped a corrupt picture");
                    }
                    Err(error) => {
                        return Err(DecodeError::VideoDecodeError(format!(
                            "receive_frame failed: {error}"
                        )));
                    }
                }
            }
        }

        let count = received.len();
        for frame in received {
            self.accept(frame)?;
        }
        Ok(count)
    }

    fn accept(&mut self, mut frame: VideoFrame) -> Result<(), DecodeError> {
        if let Some(target) = self.discard_before {
            let pts = frame.timestamp().or_else(|| frame.pts());
            if pts.is_some_and(|pts| pts < target) {
                self.frames_discarded += 1;
                return Ok(());
            }
            log::debug!(
                "Reached seek target after dropping {} frames",
                self.frames_discarded
            );
            self.discard_before = None;
        }

        if let Some(crop) = self.options.crop {
            apply_crop(&mut frame, crop)?;
        }

        let info = SurfaceInfo::describe(
            frame.format(),
            frame.width(),
            frame.height(),
            self.options.memory_type,
        )?;

        match &self.output_info {
            None => {
                log::info!(
                    "Output surface: {}x{} {:?} ({}-bit, {} bytes per frame)",
                    info.width,
                    info.height,
                    info.pixel_format,
                    info.bit_depth,
                    info.surface_size_in_bytes(),
                );
                self.output_info = Some(info.clone());
            }
            Some(current) if !current.same_geometry(&info) => self.reconfigure(&info),
            Some(_) => {}
        }

        self.ready.push_back(DecodedFrame::from_decoder(frame, info));
        Ok(())
    }

    fn reconfigure(&mut self, info: &SurfaceInfo) {
        let started = Instant::now();

        let stale: Vec<DecodedFrame> = self.ready.drain(..).collect();
        let count = stale.len();
        self.num_flushed += count as u64;
        match self.options.reconfig.flush_mode {
            ReconfigFlushMode::DumpToFile => self.flushed.extend(stale),
            ReconfigFlushMode::Discard => drop(stale),
        }

        if let Some(previous) = &self.output_info {
            log::info!(
                "Stream reconfigured: {}x{} {:?} -> {}x{} {:?}, {count} frame(s) flushed",
                previous.width,
                previous.height,
                previous.pixel_format,
                info.width,
                info.height,
                info.pixel_format,
            );
        }
        self.output_info = Some(info.clone());
        self.overheads.push(started.elapsed());
    }
}

/// Crop `frame` in place to `crop`, which must lie inside the frame.
fn apply_crop(frame: &mut VideoFrame, crop: CropRect) -> Result<(), DecodeError> {
    let (width, height) = (frame.width(), frame.height());
    if crop.right > width || crop.bottom > height {
        return Err(DecodeError::InvalidCrop(format!(
            "({}, {}, {}, {}) exceeds the {width}x{height} frame",
            crop.left, crop.top, crop.right, crop.bottom
        )));
    }
    if crop.left == 0 && crop.top == 0 && crop.right == width && crop.bottom == height {
        return Ok(());
    }

    let result = unsafe {
        let raw = frame.as_mut_ptr();
        (*raw).crop_left = crop.left as usize;
        (*raw).crop_top = crop.top as usize;
        (*raw).crop_right = (width - crop.right) as usize;
        (*raw).crop_bottom = (height - crop.bottom) as usize;
        ffmpeg_sys_next::av_frame_apply_cropping(raw, CROP_UNALIGNED)
    };
    if result < 0 {
        return Err(DecodeError::InvalidCrop(format!(
            "FFmpeg rejected the crop: {}",
            FfmpegError::from(result)
        )));
    }
    Ok(())
}
