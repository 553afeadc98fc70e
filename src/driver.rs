//! The decode loop.
//!
//! [`DecodeDriver`] wires the pieces together: it opens the [`Demuxer`],
//! checks that the device can decode the stream, creates the
//! [`DecodeSession`], and then pumps packets through the session until the
//! container is exhausted, post-processing and saving frames on the way.
//!
//! # Example
//!
//! ```no_run
//! use videodecode::{DecodeDriver, DecodeOptions};
//!
//! let mut driver = DecodeDriver::open(DecodeOptions::new("input.mp4"))?;
//! let summary = driver.run()?;
//! println!("{} frames", summary.total_frames());
//! if let Some(throughput) = summary.throughput() {
//!     println!("{:.2} fps", throughput.frames_per_second);
//! }
//! # Ok::<(), videodecode::DecodeError>(())
//! ```

use std::time::{Duration, Instant};

use crate::{
    codec::{CodecId, CodecRegistry},
    configuration::DecodeOptions,
    demuxer::{Demuxer, VideoStreamInfo},
    device::DeviceInfo,
    error::DecodeError,
    progress::ProgressTracker,
    resize::Resizer,
    rgb::RgbConverter,
    session::{DecodeSession, ReconfigFlushMode, ReconfigParams, SessionOptions},
    sink::{FrameSink, NullSink, RawFileSink},
};

/// Outcome of a decode run.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeSummary {
    /// Frames returned by the session during the loop.
    pub frames_decoded: u64,
    /// Frames flushed by reconfigurations.
    pub frames_flushed: u64,
    /// Frames saved to the output file.
    pub frames_written: u64,
    /// Frames that went through the resizer.
    pub frames_resized: u64,
    /// Frames converted to RGB24.
    pub frames_converted: u64,
    /// Mid-stream reconfigurations.
    pub reconfigurations: usize,
    /// Wall-clock time spent in the loop.
    pub decode_time: Duration,
    /// Decoder setup time included in `decode_time`.
    pub session_overhead: Duration,
    /// `true` when no output file was set.
    pub benchmark_mode: bool,
}

/// Average decode speed of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Milliseconds per frame, session overhead excluded.
    pub avg_ms_per_frame: f64,
    /// Frames per second over the whole loop.
    pub frames_per_second: f64,
}

impl DecodeSummary {
    /// Decoded plus flushed frames.
    pub fn total_frames(&self) -> u64 {
        self.frames_decoded + self.frames_flushed
    }

    /// Average speed, or `None` when nothing was decoded or no time passed.
    pub fn throughput(&self) -> Option<Throughput> {
        let total = self.total_frames();
        let seconds = self.decode_time.as_secs_f64();
        if total == 0 || seconds <= 0.0 {
            return None;
        }

        let total = total as f64;
        let overhead_ms = self.session_overhead.as_secs_f64() * 1000.0;
        Some(Throughput {
            avg_ms_per_frame: seconds * 1000.0 / total - overhead_ms / total,
            frames_per_second: total / seconds,
        })
    }
}

/// Runs one decode of one input.
#[derive(Debug)]
pub struct DecodeDriver {
    options: DecodeOptions,
    demuxer: Demuxer,
    session: DecodeSession,
    device: DeviceInfo,
    codec: CodecId,
}

impl DecodeDriver {
    /// Open the input and prepare a decode session for it.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::FileOpen`] / [`DecodeError::NoVideoStream`] from the demuxer.
    /// - [`DecodeError::DeviceNotFound`] for an unknown device.
    /// - [`DecodeError::CodecNotSupported`] when the codec or its bit depth
    ///   cannot be decoded on the device.
    pub fn open(options: DecodeOptions) -> Result<Self, DecodeError> {
        crate::ffmpeg::initialize()?;

        let demuxer = Demuxer::open(&options.input)?;
        let codec = CodecId::from_ffmpeg(demuxer.codec_id());
        let device = DeviceInfo::query(options.device_id)?;

        let registry = CodecRegistry::software();
        let bit_depth = demuxer.bit_depth();
        let codec = codec
            .filter(|&codec| registry.is_codec_supported(device.device_id, codec, bit_depth))
            .ok_or_else(|| DecodeError::CodecNotSupported {
                codec: demuxer.stream_info().codec_name.clone(),
                device_name: device.device_name.clone(),
                bit_depth,
            })?;

        let flush_mode = if options.is_benchmark() {
            ReconfigFlushMode::Discard
        } else {
            ReconfigFlushMode::DumpToFile
        };
        let session = DecodeSession::new(
            &demuxer,
            SessionOptions {
                codec,
                device_id: device.device_id,
                memory_type: options.memory_type,
                crop: options.crop,
                reconfig: ReconfigParams { flush_mode },
            },
        )?;

        Ok(Self {
            options,
            demuxer,
            session,
            device,
            codec,
        })
    }

    /// Device the session decodes on.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Codec of the video stream.
    pub fn codec(&self) -> CodecId {
        self.codec
    }

    /// Description of the video stream.
    pub fn stream_info(&self) -> &VideoStreamInfo {
        self.demuxer.stream_info()
    }

    /// Options the driver was opened with.
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// The decode session, for inspecting surface info and overheads.
    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    /// Decode the whole stream.
    ///
    /// Performs the configured seek first, then decodes until the demuxer
    /// returns an empty end-of-stream packet. Frames are resized and
    /// converted to RGB24 as configured, then saved when an output file is set.
    pub fn run(&mut self) -> Result<DecodeSummary, DecodeError> {
        let mut sink: Box<dyn FrameSink> = match &self.options.output {
            Some(path) => Box::new(RawFileSink::create(path)?),
            None => Box::new(NullSink),
        };
        let mut resizer = Resizer::new();
        let mut converter = self.options.rgb.then(RgbConverter::new);
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            Some(self.demuxer.stream_info().frame_count),
            self.options.progress_interval,
        );

        let mut pending_seek = self.options.seek;
        let mut decode_time = Duration::ZERO;
        let mut frames_decoded = 0u64;

        log::info!(
            "Decoding {} ({}) on device {}",
            self.options.input.display(),
            self.codec,
            self.device.device_id
        );

        loop {
            let started = Instant::now();

            let packet = match pending_seek.take() {
                Some(request) => self.demuxer.seek_frame(&request)?,
                None => self.demuxer.demux_frame()?,
            };
            let ready = self.session.decode_frame(&packet)?;

            for flushed in self.session.take_flushed_frames() {
                match converter.as_mut() {
                    Some(converter) => match converter.convert(&flushed)? {
                        Some(rgb) => sink.write_surface(&rgb)?,
                        None => sink.write_surface(&flushed)?,
                    },
                    None => sink.write_surface(&flushed)?,
                }
            }

            let mut last_pts = None;
            for _ in 0..ready {
                let Some(frame) = self.session.next_frame() else {
                    break;
                };
                last_pts = frame.pts();

                let resized = match self.options.resize {
                    Some(target) => resizer.resize(&frame, target)?,
                    None => None,
                };
                let rgb = match (converter.as_mut(), &resized) {
                    (Some(converter), Some(resized)) => Some(converter.convert_resized(resized)?),
                    (Some(converter), None) => converter.convert(&frame)?,
                    (None, _) => None,
                };
                match (&rgb, &resized) {
                    (Some(rgb), _) => sink.write_surface(rgb)?,
                    (None, Some(resized)) => sink.write_surface(resized)?,
                    (None, None) => sink.write_surface(&frame)?,
                }
            }

            decode_time += started.elapsed();
            frames_decoded += ready as u64;
            tracker.advance(ready as u64, last_pts);

            if packet.bitstream_size == 0 {
                break;
            }
        }

        sink.finish()?;
        tracker.finish();

        let summary = DecodeSummary {
            frames_decoded,
            frames_flushed: self.session.num_flushed_frames(),
            frames_written: sink.frames_written(),
            frames_resized: resizer.frames_resized(),
            frames_converted: converter.as_ref().map_or(0, RgbConverter::frames_converted),
            reconfigurations: self.session.reconfigure_count(),
            decode_time,
            session_overhead: self.session.total_session_overhead(),
            benchmark_mode: self.options.is_benchmark(),
        };
        log::info!(
            "Decoded {} frames ({} flushed) in {:?}",
            summary.total_frames(),
            summary.frames_flushed,
            summary.decode_time
        );
        Ok(summary)
    }
}
