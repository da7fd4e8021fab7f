//! Frame resampling along a speed curve.
//!
//! Each input frame occupies `1 / speed` units of output time. Output
//! samples are spread evenly over the total and each picks the frame whose
//! slot it falls into. Frames are repeated or dropped, never blended.

use tempo_clip_model::timeline::{ResampledTimeline, SpeedCurve};

/// Retimes a frame sequence according to a [`SpeedCurve`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameResampler;

impl FrameResampler {
    pub fn new() -> Self {
        Self
    }

    /// Number of output frames for `frame_count` inputs at `mean_speed`.
    ///
    /// Never fewer than a third of the input.
    pub fn output_count(frame_count: usize, mean_speed: f64) -> usize {
        let target = (frame_count as f64 / mean_speed).round() as usize;
        target.max(frame_count / 3)
    }

    /// Cumulative time axis and output sample times for a curve.
    pub fn timeline(&self, frame_count: usize, curve: &SpeedCurve) -> ResampledTimeline {
        let mut cumulative = Vec::with_capacity(curve.len() + 1);
        let mut total = 0.0;
        cumulative.push(total);
        for &speed in curve.values() {
            total += 1.0 / speed;
            cumulative.push(total);
        }

        let count = Self::output_count(frame_count, curve.mean());
        let output_times = match count {
            0 => Vec::new(),
            1 => vec![0.0],
            _ => {
                let last = (count - 1) as f64;
                (0..count).map(|i| total * i as f64 / last).collect()
            }
        };

        ResampledTimeline {
            cumulative,
            output_times,
        }
    }

    /// Input frame index chosen for each output frame.
    pub fn source_indices(&self, frame_count: usize, curve: &SpeedCurve) -> Vec<usize> {
        if frame_count == 0 {
            return Vec::new();
        }
        if curve.is_empty() || !(curve.mean() > 0.0) {
            return (0..frame_count).collect();
        }

        let timeline = self.timeline(frame_count, curve);
        timeline
            .output_times
            .iter()
            .map(|&t| {
                let slot = timeline.cumulative.partition_point(|&c| c <= t);
                slot.saturating_sub(1).min(frame_count - 1)
            })
            .collect()
    }

    /// Retime `frames`. Items are cloned, so shared frame handles stay
    /// shared.
    pub fn resample<T: Clone>(&self, frames: &[T], curve: &SpeedCurve) -> Vec<T> {
        let indices = self.source_indices(frames.len(), curve);
        let output: Vec<T> = indices.iter().map(|&i| frames[i].clone()).collect();

        tracing::debug!(
            input_frames = frames.len(),
            output_frames = output.len(),
            mean_speed = curve.mean(),
            "Resampled frames"
        );

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_clip_model::frame::Frame;

    #[test]
    fn test_identity_curve_keeps_frames() {
        let frames: Vec<usize> = (0..50).collect();
        let out = FrameResampler.resample(&frames, &SpeedCurve::identity(50));
        assert_eq!(out, frames);
    }

    #[test]
    fn test_identity_curve_one_shorter_than_frames() {
        // Motion series have one sample per pair.
        let frames: Vec<usize> = (0..50).collect();
        let out = FrameResampler.resample(&frames, &SpeedCurve::identity(49));
        assert_eq!(out, frames);
    }

    #[test]
    fn test_double_speed_halves_frame_count() {
        let frames: Vec<usize> = (0..90).collect();
        for len in [89, 90] {
            let out = FrameResampler.resample(&frames, &SpeedCurve::new(vec![2.0; len]));
            assert_eq!(out.len(), 45);
            assert_eq!(out[0], 0);
            for pair in out.windows(2) {
                assert!(pair[1] > pair[0]);
            }
        }
    }

    #[test]
    fn test_half_speed_repeats_frames() {
        let frames: Vec<usize> = (0..20).collect();
        let out = FrameResampler.resample(&frames, &SpeedCurve::new(vec![0.5; 20]));
        assert_eq!(out.len(), 40);
        assert_eq!(out[0], 0);
        assert_eq!(out[39], 19);
        for pair in out.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_output_count_floor() {
        // 30 / 10 = 3 would drop below a third of the input.
        assert_eq!(FrameResampler::output_count(30, 10.0), 10);
        assert_eq!(FrameResampler::output_count(90, 2.0), 45);
        assert_eq!(FrameResampler::output_count(3, 1.0), 3);
    }

    #[test]
    fn test_cumulative_axis_is_strictly_increasing() {
        let curve = SpeedCurve::new(vec![0.6, 1.0, 2.0, 1.5]);
        let timeline = FrameResampler.timeline(5, &curve);
        assert_eq!(timeline.cumulative.len(), 5);
        assert_eq!(timeline.cumulative[0], 0.0);
        for pair in timeline.cumulative.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(timeline.output_times[0], 0.0);
        let last = *timeline.output_times.last().unwrap();
        assert!((last - timeline.total_time()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        let empty: Vec<usize> = Vec::new();
        assert!(FrameResampler.resample(&empty, &SpeedCurve::identity(3)).is_empty());

        let frames = vec![1, 2, 3];
        assert_eq!(FrameResampler.resample(&frames, &SpeedCurve::default()), frames);
    }

    #[test]
    fn test_frames_are_shared_not_copied() {
        let frames: Vec<Frame> = (0..12).map(|i| Frame::solid(2, 2, [i, i, i])).collect();
        let out = FrameResampler.resample(&frames, &SpeedCurve::new(vec![0.5; 12]));
        assert!(out[0].same_buffer(&frames[0]));
        assert!(out[1].same_buffer(&frames[0]));
    }
}
