//! End-to-end decode tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.
//! The main fixture holds 150 frames of 640x480 yuv420p H.264 with a key
//! frame every 30 frames. The reconfiguration fixture is raw H.264 with 30
//! frames at 640x480 followed by 30 frames at 320x240.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use videodecode::{
    CodecId, CropRect, DecodeDriver, DecodeError, DecodeOptions, DecodeSession, Demuxer,
    MemoryType, ProgressCallback, ProgressInfo, ReconfigFlushMode, ResizeDimensions, SeekCriteria,
    SeekMode, SeekRequest, SessionOptions, Surface,
};

const FIXTURE_FRAMES: u64 = 150;
const SEGMENT_FRAMES: u64 = 30;

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_reconfig_path() -> &'static str {
    "tests/fixtures/sample_reconfig.h264"
}

fn yuv420_size(width: u64, height: u64) -> u64 {
    width * height + 2 * width.div_ceil(2) * height.div_ceil(2)
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).expect("output file exists").len()
}

#[test]
fn benchmark_run_decodes_every_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut driver = DecodeDriver::open(DecodeOptions::new(path)).expect("Failed to open driver");
    assert_eq!(driver.codec(), CodecId::H264);
    assert_eq!(driver.device().device_id, 0);

    let summary = driver.run().expect("Failed to decode");
    assert!(summary.benchmark_mode);
    assert_eq!(summary.total_frames(), FIXTURE_FRAMES);
    assert_eq!(summary.frames_flushed, 0);
    assert_eq!(summary.frames_written, 0);
    assert_eq!(summary.reconfigurations, 0);
    assert!(summary.session_overhead <= summary.decode_time);

    let throughput = summary.throughput().expect("frames were decoded");
    assert!(throughput.frames_per_second > 0.0);
}

#[test]
fn output_size_matches_frames_times_surface_size() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    for memory_type in [MemoryType::Internal, MemoryType::DeviceCopied, MemoryType::HostCopied] {
        let output = temporary_directory.path().join(format!("{memory_type:?}.yuv"));
        let options = DecodeOptions::new(path)
            .with_output(&output)
            .with_memory_type(memory_type);

        let mut driver = DecodeDriver::open(options).expect("Failed to open driver");
        let summary = driver.run().expect("Failed to decode");

        let surface = driver
            .session()
            .output_surface_info()
            .expect("surface known after decoding");
        assert_eq!((surface.width, surface.height), (640, 480));
        assert_eq!(summary.frames_written, FIXTURE_FRAMES);
        assert_eq!(
            file_size(&output),
            summary.frames_written * surface.surface_size_in_bytes() as u64
        );
        assert_eq!(file_size(&output), FIXTURE_FRAMES * yuv420_size(640, 480));
    }
}

#[test]
fn unmapped_surfaces_write_nothing() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("unmapped.yuv");
    let options = DecodeOptions::new(path)
        .with_output(&output)
        .with_memory_type(MemoryType::NotMapped);

    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.total_frames(), FIXTURE_FRAMES);
    assert_eq!(summary.frames_written, 0);
    assert_eq!(file_size(&output), 0);
}

#[test]
fn crop_shrinks_the_output_surface() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("cropped.yuv");
    let options = DecodeOptions::new(path)
        .with_output(&output)
        .with_crop(CropRect::new(0, 0, 320, 240).unwrap());

    let mut driver = DecodeDriver::open(options).unwrap();
    let summary = driver.run().unwrap();

    let surface = driver.session().output_surface_info().unwrap();
    assert_eq!((surface.width, surface.height), (320, 240));
    assert_eq!(file_size(&output), summary.frames_written * yuv420_size(320, 240));
}

#[test]
fn crop_larger_than_the_frame_fails() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = DecodeOptions::new(path).with_crop(CropRect::new(0, 0, 1920, 1080).unwrap());
    let result = DecodeDriver::open(options).unwrap().run();
    assert!(matches!(result, Err(DecodeError::InvalidCrop(_))));
}

#[test]
fn resize_produces_target_sized_frames() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("resized.yuv");
    let options = DecodeOptions::new(path)
        .with_output(&output)
        .with_resize(ResizeDimensions::new(320, 180));

    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.frames_resized, FIXTURE_FRAMES);
    assert_eq!(file_size(&output), FIXTURE_FRAMES * yuv420_size(320, 180));
}

#[test]
fn resize_to_source_size_is_a_no_op() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = DecodeOptions::new(path).with_resize(ResizeDimensions::new(640, 480));
    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.frames_resized, 0);
    assert_eq!(summary.total_frames(), FIXTURE_FRAMES);
}

#[test]
fn exact_seek_skips_frames_before_the_target() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = DecodeOptions::new(path).with_seek(SeekRequest {
        value: 75,
        mode: SeekMode::ExactFrame,
        criteria: SeekCriteria::FrameNumber,
    });
    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.total_frames(), FIXTURE_FRAMES - 75);
}

#[test]
fn key_frame_seek_starts_at_or_before_the_target() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = DecodeOptions::new(path).with_seek(SeekRequest {
        value: 75,
        mode: SeekMode::PreviousKeyFrame,
        criteria: SeekCriteria::FrameNumber,
    });
    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert!(summary.total_frames() >= FIXTURE_FRAMES - 75);
    assert!(summary.total_frames() < FIXTURE_FRAMES);
}

#[test]
fn seek_by_seconds() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = DecodeOptions::new(path).with_seek(SeekRequest {
        value: 2,
        mode: SeekMode::ExactFrame,
        criteria: SeekCriteria::Timestamp,
    });
    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.total_frames(), FIXTURE_FRAMES - 60);
}

#[derive(Default)]
struct Recorder {
    reports: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.reports.lock().unwrap().push(info.clone());
    }
}

#[test]
fn progress_ends_with_a_finished_report() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let recorder = Arc::new(Recorder::default());
    let options = DecodeOptions::new(path)
        .with_progress(recorder.clone())
        .with_progress_interval(25);
    let summary = DecodeDriver::open(options).unwrap().run().unwrap();

    let reports = recorder.reports.lock().unwrap();
    assert!(reports.len() >= 2);
    let last = reports.last().unwrap();
    assert!(last.finished);
    assert_eq!(last.current, summary.frames_decoded);
    assert_eq!(last.total, Some(FIXTURE_FRAMES));
    assert!(reports.windows(2).all(|pair| pair[0].current <= pair[1].current));
}

#[test]
fn session_can_be_driven_by_hand() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).unwrap();
    let mut options = SessionOptions::new(CodecId::H264);
    options.memory_type = MemoryType::HostCopied;
    let mut session = DecodeSession::new(&demuxer, options).unwrap();

    assert!(session.output_surface_info().is_none());
    assert_eq!(session.session_overhead(0), None);

    let mut frames = 0u64;
    let mut last_pts = None;
    loop {
        let packet = demuxer.demux_frame().unwrap();
        let ready = session.decode_frame(&packet).unwrap();
        for _ in 0..ready {
            let frame = session.next_frame().expect("frame ready");
            assert!(frame.is_mapped());
            assert_eq!(frame.frame_size(), yuv420_size(640, 480) as usize);
            assert_eq!(frame.is_key_frame(), frames % 30 == 0, "frame {frames}");
            assert!(frame.pts() > last_pts);
            last_pts = frame.pts();
            frames += 1;
        }
        if packet.bitstream_size == 0 {
            break;
        }
    }

    assert_eq!(frames, FIXTURE_FRAMES);
    assert!(session.session_overhead(0).is_some());
    assert_eq!(session.session_overhead(1), None);
    assert_eq!(session.reconfigure_count(), 0);
    assert_eq!(session.num_flushed_frames(), 0);
    assert_eq!(session.frames_discarded(), 0);
    assert!(session.take_flushed_frames().is_empty());
}

#[test]
fn exact_seek_by_hand_discards_back_to_the_key_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).unwrap();
    let mut session = DecodeSession::new(&demuxer, SessionOptions::new(CodecId::H264)).unwrap();

    let mut packet = demuxer
        .seek_frame(&SeekRequest {
            value: 75,
            mode: SeekMode::ExactFrame,
            criteria: SeekCriteria::FrameNumber,
        })
        .unwrap();
    let target = packet.seek.expect("seek marker").target_pts;

    let mut kept = Vec::new();
    loop {
        let ready = session.decode_frame(&packet).unwrap();
        for _ in 0..ready {
            kept.push(session.next_frame().unwrap());
        }
        if packet.bitstream_size == 0 {
            break;
        }
        packet = demuxer.demux_frame().unwrap();
    }

    // The container lands on key frame 60; frames 60..75 are dropped.
    assert_eq!(session.frames_discarded(), 15);
    assert_eq!(kept.len() as u64, FIXTURE_FRAMES - 75);
    assert_eq!(kept[0].pts(), Some(target));
    assert!(!kept[0].is_key_frame());
    assert!(kept[15].is_key_frame());
}

#[test]
fn rgb_output_is_three_bytes_per_pixel() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("frames.rgb");
    let options = DecodeOptions::new(path).with_output(&output).with_rgb(true);

    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.frames_converted, FIXTURE_FRAMES);
    assert_eq!(summary.frames_written, FIXTURE_FRAMES);
    assert_eq!(file_size(&output), FIXTURE_FRAMES * 640 * 480 * 3);
}

#[test]
fn rgb_conversion_follows_crop_and_resize() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("small.rgb");
    let options = DecodeOptions::new(path)
        .with_output(&output)
        .with_memory_type(MemoryType::Internal)
        .with_crop(CropRect::new(0, 0, 320, 240).unwrap())
        .with_resize(ResizeDimensions::new(160, 90))
        .with_rgb(true);

    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.frames_resized, FIXTURE_FRAMES);
    assert_eq!(summary.frames_converted, FIXTURE_FRAMES);
    assert_eq!(file_size(&output), FIXTURE_FRAMES * 160 * 90 * 3);
}

#[test]
fn rgb_skips_unmapped_surfaces() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = DecodeOptions::new(path)
        .with_memory_type(MemoryType::NotMapped)
        .with_rgb(true);
    let summary = DecodeDriver::open(options).unwrap().run().unwrap();
    assert_eq!(summary.total_frames(), FIXTURE_FRAMES);
    assert_eq!(summary.frames_converted, 0);
}

#[test]
fn resolution_change_is_written_in_both_geometries() {
    let path = sample_reconfig_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("reconfig.yuv");
    let options = DecodeOptions::new(path)
        .with_output(&output)
        .with_memory_type(MemoryType::HostCopied);

    let mut driver = DecodeDriver::open(options).expect("Failed to open driver");
    let flush_mode = driver.session().options().reconfig.flush_mode;
    assert_eq!(flush_mode, ReconfigFlushMode::DumpToFile);
    let summary = driver.run().expect("Failed to decode");

    assert!(summary.reconfigurations >= 1);
    assert_eq!(summary.total_frames(), 2 * SEGMENT_FRAMES);
    assert_eq!(summary.frames_written, summary.total_frames());
    assert_eq!(
        file_size(&output),
        SEGMENT_FRAMES * (yuv420_size(640, 480) + yuv420_size(320, 240))
    );

    let surface = driver.session().output_surface_info().unwrap();
    assert_eq!((surface.width, surface.height), (320, 240));
    assert!(driver.session().session_overhead(1).is_some());
}

#[test]
fn resolution_change_in_benchmark_mode_counts_every_frame() {
    let path = sample_reconfig_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut driver = DecodeDriver::open(DecodeOptions::new(path)).unwrap();
    let flush_mode = driver.session().options().reconfig.flush_mode;
    assert_eq!(flush_mode, ReconfigFlushMode::Discard);
    let summary = driver.run().unwrap();
    assert!(summary.reconfigurations >= 1);
    assert_eq!(summary.total_frames(), 2 * SEGMENT_FRAMES);
    assert_eq!(summary.frames_written, 0);
}

#[test]
fn frames_queued_across_a_resolution_change_are_flushed() {
    let path = sample_reconfig_path();
    if !Path::new(path).exists() {
        return;
    }

    for flush_mode in [ReconfigFlushMode::DumpToFile, ReconfigFlushMode::Discard] {
        let mut demuxer = Demuxer::open(path).unwrap();
        let mut options = SessionOptions::new(CodecId::H264);
        options.reconfig.flush_mode = flush_mode;
        let mut session = DecodeSession::new(&demuxer, options).unwrap();

        // Feed everything before pulling a single frame.
        loop {
            let packet = demuxer.demux_frame().unwrap();
            session.decode_frame(&packet).unwrap();
            if packet.end_of_stream {
                break;
            }
        }

        assert_eq!(session.reconfigure_count(), 1);
        assert_eq!(session.num_flushed_frames(), SEGMENT_FRAMES);

        let flushed = session.take_flushed_frames();
        match flush_mode {
            ReconfigFlushMode::DumpToFile => {
                assert_eq!(flushed.len() as u64, SEGMENT_FRAMES);
                assert!(flushed.iter().all(|frame| frame.surface_info().width == 640));
            }
            ReconfigFlushMode::Discard => assert!(flushed.is_empty()),
        }

        let mut remaining = 0;
        while let Some(frame) = session.next_frame() {
            assert_eq!(frame.surface_info().width, 320);
            remaining += 1;
        }
        assert_eq!(remaining, SEGMENT_FRAMES);
    }
}

#[test]
fn corrupt_packets_do_not_stop_the_run() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // Garble a stretch of the media data; the container index stays intact.
    let mut bytes = std::fs::read(path).unwrap();
    let start = bytes.len() * 2 / 5;
    let end = start + 4096;
    for (offset, byte) in bytes[start..end].iter_mut().enumerate() {
        *byte = (offset as u8).wrapping_mul(151) ^ 0x5a;
    }
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let garbled = temporary_directory.path().join("garbled.mp4");
    std::fs::write(&garbled, &bytes).unwrap();

    let summary = DecodeDriver::open(DecodeOptions::new(&garbled))
        .expect("container still opens")
        .run()
        .expect("corrupt data is skipped");
    assert!(summary.total_frames() > 0);
    assert!(summary.total_frames() <= FIXTURE_FRAMES);
}
