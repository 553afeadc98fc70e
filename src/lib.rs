//! # videodecode
//!
//! Decode the video stream of a media file as fast as the backend allows,
//! optionally cropping, seeking, resizing, converting to RGB, and dumping
//! raw frames to disk.
//!
//! `videodecode` is a decode driver built on FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate. It demuxes the
//! best video stream of a container, pushes every packet through a decode
//! session, and reports how many frames came out and how long it took.
//!
//! ## Quick Start
//!
//! ### Benchmark a File
//!
//! ```no_run
//! use videodecode::{DecodeDriver, DecodeOptions};
//!
//! let mut driver = DecodeDriver::open(DecodeOptions::new("input.mp4"))?;
//! let summary = driver.run()?;
//! if let Some(throughput) = summary.throughput() {
//!     println!("{:.2} ms/frame, {:.2} fps", throughput.avg_ms_per_frame, throughput.frames_per_second);
//! }
//! # Ok::<(), videodecode::DecodeError>(())
//! ```
//!
//! ### Dump Cropped, Resized Frames
//!
//! ```no_run
//! use videodecode::{CropRect, DecodeDriver, DecodeOptions, ResizeDimensions};
//!
//! let options = DecodeOptions::new("input.mp4")
//!     .with_output("frames.yuv")
//!     .with_crop(CropRect::new(0, 0, 1280, 720)?)
//!     .with_resize(ResizeDimensions::new(640, 360));
//! DecodeDriver::open(options)?.run()?;
//! # Ok::<(), videodecode::DecodeError>(())
//! ```
//!
//! ### Drive the Pieces Yourself
//!
//! ```no_run
//! use videodecode::{CodecId, DecodeSession, Demuxer, SessionOptions};
//!
//! let mut demuxer = Demuxer::open("input.mp4")?;
//! let codec = CodecId::from_ffmpeg(demuxer.codec_id()).expect("routable codec");
//! let mut session = DecodeSession::new(&demuxer, SessionOptions::new(codec))?;
//! loop {
//!     let packet = demuxer.demux_frame()?;
//!     for _ in 0..session.decode_frame(&packet)? {
//!         let _frame = session.next_frame();
//!     }
//!     if packet.bitstream_size == 0 {
//!         break;
//!     }
//! }
//! # Ok::<(), videodecode::DecodeError>(())
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod codec;
pub mod configuration;
mod conversion;
pub mod demuxer;
pub mod device;
pub mod driver;
pub mod error;
pub mod ffmpeg;
pub mod progress;
pub mod resize;
pub mod rgb;
pub mod session;
pub mod sink;
pub mod surface;

pub use codec::{CodecCapability, CodecId, CodecRegistry};
pub use configuration::{
    CropRect, DecodeArguments, DecodeOptions, MemoryType, ResizeDimensions, SeekCriteria,
    SeekMode, SeekRequest,
};
pub use demuxer::{DemuxedPacket, Demuxer, SeekMarker, VideoStreamInfo};
pub use device::DeviceInfo;
pub use driver::{DecodeDriver, DecodeSummary, Throughput};
pub use error::DecodeError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use progress::{ProgressCallback, ProgressInfo};
pub use resize::{ResizedFrame, Resizer};
pub use rgb::{RgbConverter, RgbFrame};
pub use session::{DecodeSession, ReconfigFlushMode, ReconfigParams, SessionOptions};
pub use sink::{FrameSink, NullSink, RawFileSink};
pub use surface::{DecodedFrame, PlaneLayout, Surface, SurfaceFormat, SurfaceInfo};
