//! Frame budget and packing decisions.
//!
//! Short videos are sampled at the requested rate with no packing. Long videos
//! pack several frames per temporal unit, and very long videos are capped at
//! `max_frames * max_packing` frames no matter how long they run.

use serde::Serialize;

use reelchat_core::SamplingConfig;

/// Which branch of the budget decision produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPath {
    /// Requested frames fit in `max_frames`; packing is 1.
    Short,
    /// Packing absorbs the requested density.
    Packed,
    /// Packing hit `max_packing`; frame count is the hard ceiling.
    Capped,
}

/// Number of frames to extract and how many of them form one temporal pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingPlan {
    pub frame_count: usize,
    pub packing: usize,
    pub path: BudgetPath,
    /// Packing came from a caller override rather than the budget.
    pub forced: bool,
}

impl SamplingPlan {
    /// Decide the frame budget for a stream of `total_frames` at `fps`.
    ///
    /// `force_packing` of `Some(k)` with `k > 0` replaces the computed packing
    /// with `min(k, max_packing)` and leaves the frame count alone.
    /// The resulting frame count is kept within `1..=total_frames` and never
    /// exceeds `config.frame_ceiling()`.
    pub fn compute(
        config: &SamplingConfig,
        fps: f64,
        total_frames: usize,
        choose_fps: u32,
        force_packing: Option<usize>,
    ) -> Self {
        let duration = total_frames as f64 / fps;
        let max_frames = config.max_frames() as f64;
        let choose = f64::from(choose_fps);

        let requested = u64::from(choose_fps) * duration.floor() as u64;

        let (mut frame_count, mut packing, path) = if requested <= config.max_frames() as u64 {
            let rate = choose.min(round_half_even(fps));
            let count = round_half_even(rate * max_frames.min(duration));
            (count as usize, 1, BudgetPath::Short)
        } else {
            let packing = (duration * choose / max_frames).ceil() as usize;
            if packing <= config.max_packing() {
                let count = round_half_even(duration * choose);
                (count as usize, packing, BudgetPath::Packed)
            } else {
                (config.frame_ceiling(), config.max_packing(), BudgetPath::Capped)
            }
        };

        let mut forced = false;
        if let Some(k) = force_packing.filter(|&k| k > 0) {
            packing = k.min(config.max_packing());
            forced = true;
        }

        frame_count = frame_count
            .min(config.frame_ceiling())
            .min(total_frames)
            .max(1);

        Self {
            frame_count,
            packing,
            path,
            forced,
        }
    }

    /// Number of temporal groups the plan yields.
    pub fn group_count(&self) -> usize {
        self.frame_count.div_ceil(self.packing)
    }
}

/// Pick `count` indices from `0..total` at the centers of equal-width buckets.
///
/// Deterministic. With `count <= total` the indices are strictly increasing.
pub fn uniform_sample(total: usize, count: usize) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let gap = total as f64 / count as f64;
    (0..count)
        .map(|i| (i as f64 * gap + gap / 2.0) as usize)
        .collect()
}

/// Round to nearest, ties to even.
pub(crate) fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}
