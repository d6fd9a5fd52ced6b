//! Temporal id assignment for sampled frames.
//!
//! Timestamps are snapped to the nearest tick of a uniform axis
//! `0, step, 2*step, ...` below the video duration, then expressed in units of
//! `step` (truncated). The ids travel with the frames so the model can reason
//! about spacing between packed frames.

use reelchat_core::{TemporalGroup, TemporalId};

/// Sorted tick axis used to discretize timestamps.
#[derive(Debug, Clone)]
pub struct TimeAxis {
    step: f64,
    ticks: Vec<f64>,
}

impl TimeAxis {
    /// Ticks `k * step` for `k` in `0..ceil(duration / step)`. Always holds at least the zero tick.
    pub fn new(duration_seconds: f64, step: f64) -> Self {
        let len = ((duration_seconds / step).ceil() as usize).max(1);
        let ticks = (0..len).map(|k| k as f64 * step).collect();
        Self { step, ticks }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Nearest tick to `t`; equidistant candidates resolve to the lower tick.
    pub fn nearest(&self, t: f64) -> f64 {
        let upper = self.ticks.partition_point(|&tick| tick < t);
        if upper == 0 {
            return self.ticks[0];
        }
        if upper == self.ticks.len() {
            return self.ticks[upper - 1];
        }
        let lo = self.ticks[upper - 1];
        let hi = self.ticks[upper];
        if t - lo <= hi - t {
            lo
        } else {
            hi
        }
    }

    pub fn temporal_id(&self, t: f64) -> TemporalId {
        (self.nearest(t) / self.step) as TemporalId
    }
}

/// One temporal id per frame index, in the order given.
pub fn temporal_ids(indices: &[usize], fps: f64, axis: &TimeAxis) -> Vec<TemporalId> {
    indices
        .iter()
        .map(|&index| axis.temporal_id(index as f64 / fps))
        .collect()
}

/// Split ids into consecutive chunks of `size`; the last chunk keeps the remainder.
pub fn group_ids(ids: &[TemporalId], size: usize) -> Vec<TemporalGroup> {
    ids.chunks(size.max(1)).map(<[TemporalId]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_stops_before_duration() {
        let axis = TimeAxis::new(1.0, 0.25);
        assert_eq!(axis.len(), 4);
        assert_eq!(axis.nearest(0.99), 0.75);
    }

    #[test]
    fn axis_never_empty() {
        let axis = TimeAxis::new(0.0, 0.1);
        assert_eq!(axis.len(), 1);
        assert_eq!(axis.temporal_id(0.0), 0);
    }

    #[test]
    fn ties_resolve_to_lower_tick() {
        let axis = TimeAxis::new(2.0, 0.5);
        assert_eq!(axis.nearest(0.25), 0.0);
        assert_eq!(axis.nearest(0.75), 0.5);
        assert_eq!(axis.nearest(0.76), 1.0);
    }

    #[test]
    fn ids_follow_scale_buckets() {
        // 10 s at 30 fps, indices at bucket centers of 30 samples.
        let axis = TimeAxis::new(10.0, 0.1);
        let ids = temporal_ids(&[5, 15, 25, 35, 295], 30.0, &axis);
        assert_eq!(ids, vec![2, 5, 8, 12, 98]);
    }

    #[test]
    fn nearby_frames_share_an_id() {
        let axis = TimeAxis::new(10.0, 1.0);
        let ids = temporal_ids(&[30, 31, 32], 30.0, &axis);
        assert_eq!(ids, vec![1, 1, 1]);
    }

    #[test]
    fn grouping_keeps_remainder_last() {
        let groups = group_ids(&[1, 2, 3, 4, 5, 6, 7], 3);
        assert_eq!(groups, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        assert_eq!(group_ids(&[1, 2], 1), vec![vec![1], vec![2]]);
        assert!(group_ids(&[], 2).is_empty());
    }
}
