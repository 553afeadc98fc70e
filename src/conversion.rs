//! Internal timestamp conversion helpers.
//!
//! Streams count time in their own time base, while container-level seeking
//! (`avformat_seek_file` with `stream_index = -1`) expects AV_TIME_BASE
//! microseconds. These helpers keep the arithmetic in one place.

use ffmpeg_next::Rational;

/// AV_TIME_BASE ticks per second.
const MICROSECONDS_PER_SECOND: f64 = 1_000_000.0;

/// Convert a rational frame rate to frames per second, `0.0` if undefined.
pub(crate) fn frames_per_second(rate: Rational) -> f64 {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64
}

/// Convert seconds to a timestamp in the stream's time base.
pub(crate) fn seconds_to_stream_timestamp(seconds: f64, time_base: Rational) -> i64 {
    let numerator = time_base.numerator().max(1) as f64;
    let denominator = time_base.denominator() as f64;
    (seconds * denominator / numerator).round() as i64
}

/// Convert a frame number to a timestamp in the stream's time base.
pub(crate) fn frame_number_to_stream_timestamp(
    frame_number: u64,
    frames_per_second: f64,
    time_base: Rational,
) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    seconds_to_stream_timestamp(frame_number as f64 / frames_per_second, time_base)
}

/// Convert a stream timestamp to a container seek timestamp in AV_TIME_BASE.
pub(crate) fn stream_timestamp_to_seek_timestamp(timestamp: i64, time_base: Rational) -> i64 {
    (pts_to_seconds(timestamp, time_base) * MICROSECONDS_PER_SECOND) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_handles_zero_denominator() {
        assert_eq!(frames_per_second(Rational::new(30, 1)), 30.0);
        assert_eq!(frames_per_second(Rational::new(30, 0)), 0.0);
        assert_eq!(frames_per_second(Rational::new(0, 1)), 0.0);
    }

    #[test]
    fn frame_number_maps_onto_time_base() {
        let time_base = Rational::new(1, 12_800);
        assert_eq!(frame_number_to_stream_timestamp(10, 25.0, time_base), 5_120);
        assert_eq!(frame_number_to_stream_timestamp(10, 0.0, time_base), 0);
    }

    #[test]
    fn ntsc_frame_numbers_land_on_exact_ticks() {
        let time_base = Rational::new(1, 30_000);
        let fps = 30_000.0 / 1_001.0;
        for frame in [1_u64, 7, 299, 1_000] {
            assert_eq!(
                frame_number_to_stream_timestamp(frame, fps, time_base),
                frame as i64 * 1_001
            );
        }
    }

    #[test]
    fn seek_timestamp_is_in_microseconds() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(stream_timestamp_to_seek_timestamp(180_000, time_base), 2_000_000);
        assert_eq!(seconds_to_stream_timestamp(2.0, time_base), 180_000);
        assert!((pts_to_seconds(45_000, time_base) - 0.5).abs() < 1e-9);
    }
}
