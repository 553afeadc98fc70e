//! Demuxer integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;

use ffmpeg_next::codec::Id;
use videodecode::{DecodeError, Demuxer, SeekCriteria, SeekMode, SeekRequest};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_audio_path() -> &'static str {
    "tests/fixtures/sample_audio.wav"
}

#[test]
fn open_nonexistent_file() {
    let error = Demuxer::open("this_file_does_not_exist.mp4").unwrap_err();
    assert!(matches!(error, DecodeError::FileOpen { .. }));
    assert!(
        error.to_string().contains("Failed to open media file"),
        "Error message should mention file open failure: {error}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    assert!(Demuxer::open(&invalid_file_path).is_err());
}

#[test]
fn audio_only_file_has_no_video_stream() {
    let path = sample_audio_path();
    if !Path::new(path).exists() {
        return;
    }

    let result = Demuxer::open(path);
    assert!(matches!(result, Err(DecodeError::NoVideoStream)));
}

#[test]
fn stream_info_describes_the_fixture() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let demuxer = Demuxer::open(path).expect("Failed to open test video");
    let info = demuxer.stream_info();

    assert_eq!(demuxer.path(), Path::new(path));
    assert_eq!(demuxer.codec_id(), Id::H264);
    assert_eq!(demuxer.bit_depth(), 8);
    assert_eq!((info.width, info.height), (640, 480));
    assert!((info.frames_per_second - 30.0).abs() < 0.01);
    assert_eq!(info.frame_count, 150);
    assert!(info.container_format.contains("mp4"));
    assert!(info.duration.as_secs_f64() > 4.9);
}

#[test]
fn packets_come_from_the_video_stream_only() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).expect("Failed to open test video");
    let video_index = demuxer.stream_info().stream_index;

    let first = demuxer.demux_frame().expect("Failed to read packet");
    assert!(first.is_key_frame, "first packet should be a key frame");

    let mut count = 1;
    loop {
        let packet = demuxer.demux_frame().expect("Failed to read packet");
        if packet.end_of_stream {
            assert_eq!(packet.bitstream_size, 0);
            break;
        }
        assert_eq!(packet.stream_index, video_index);
        assert!(packet.bitstream_size > 0);
        count += 1;
    }

    assert_eq!(count, 150);
    assert_eq!(demuxer.packets_read(), 150);
}

#[test]
fn end_of_stream_is_sticky() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).expect("Failed to open test video");
    while !demuxer.demux_frame().unwrap().end_of_stream {}

    for _ in 0..3 {
        let packet = demuxer.demux_frame().expect("EOS must not fail");
        assert!(packet.end_of_stream);
        assert_eq!(packet.bitstream_size, 0);
    }
}

#[test]
fn seek_lands_on_a_key_frame_with_marker() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).expect("Failed to open test video");
    let request = SeekRequest {
        value: 75,
        mode: SeekMode::ExactFrame,
        criteria: SeekCriteria::FrameNumber,
    };
    let packet = demuxer.seek_frame(&request).expect("Failed to seek");

    assert!(packet.is_key_frame);
    let marker = packet.seek.expect("seek marker");
    assert_eq!(marker.mode, SeekMode::ExactFrame);
    assert!(packet.pts.expect("pts") <= marker.target_pts);
}

#[test]
fn seek_by_seconds_matches_seek_by_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).expect("Failed to open test video");
    let by_frame = demuxer
        .seek_frame(&SeekRequest {
            value: 60,
            mode: SeekMode::PreviousKeyFrame,
            criteria: SeekCriteria::FrameNumber,
        })
        .expect("Failed to seek by frame");
    let by_time = demuxer
        .seek_frame(&SeekRequest {
            value: 2,
            mode: SeekMode::PreviousKeyFrame,
            criteria: SeekCriteria::Timestamp,
        })
        .expect("Failed to seek by time");

    assert_eq!(
        by_frame.seek.map(|marker| marker.target_pts),
        by_time.seek.map(|marker| marker.target_pts)
    );
    assert_eq!(by_frame.pts, by_time.pts);
}

#[test]
fn seek_past_the_time_line_does_not_overflow() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).expect("Failed to open test video");
    let request = SeekRequest {
        value: u64::MAX,
        mode: SeekMode::ExactFrame,
        criteria: SeekCriteria::Timestamp,
    };
    assert_eq!(demuxer.stream_info().seek_target(&request), i64::MAX);

    // FFmpeg may refuse the position; either way nothing wraps around.
    if let Ok(packet) = demuxer.seek_frame(&request) {
        let marker = packet.seek.expect("seek marker");
        assert_eq!(marker.target_pts, i64::MAX);
    }
}

#[test]
fn resolution_change_fixture_is_raw_h264() {
    let path = "tests/fixtures/sample_reconfig.h264";
    if !Path::new(path).exists() {
        return;
    }

    let mut demuxer = Demuxer::open(path).expect("Failed to open test video");
    assert_eq!(demuxer.codec_id(), Id::H264);
    assert_eq!((demuxer.stream_info().width, demuxer.stream_info().height), (640, 480));

    let mut count = 0;
    while !demuxer.demux_frame().unwrap().end_of_stream {
        count += 1;
    }
    assert_eq!(count, 60);
}
