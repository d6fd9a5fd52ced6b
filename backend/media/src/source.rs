//! Decoder seams for random frame access.

use std::path::Path;

use image::RgbImage;
use reelchat_core::VideoError;

/// An open video container with indexable frame access.
///
/// Handles are opened per encode call and dropped on return.
pub trait VideoSource: Send {
    /// Average frame rate in frames per second.
    fn avg_fps(&self) -> f64;

    /// Total number of frames in the primary video stream.
    fn frame_count(&self) -> usize;

    /// Decode the given frame indices into RGB stills.
    ///
    /// `indices` must be strictly ascending. Returned images follow the same
    /// order. A source may return fewer images than requested when the
    /// stream ends early; callers treat that as a consistency failure.
    fn get_batch(&mut self, indices: &[usize]) -> Result<Vec<RgbImage>, VideoError>;
}

/// Opens video containers by path.
pub trait VideoBackend: Send + Sync {
    /// Backend name for logs (e.g., "ffmpeg").
    fn name(&self) -> &str;

    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, VideoError>;
}
