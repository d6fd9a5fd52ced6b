//! In-memory video backend.
//!
//! Frames are generated on demand; every pixel of frame `n` encodes `n` in its
//! RGB channels so callers can tell exactly which indices were decoded.
//! Used by tests and dry runs where no real container is available.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use reelchat_core::VideoError;

use crate::source::{VideoBackend, VideoSource};

/// Description of a generated clip.
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    pub fps: f64,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    /// Decoding this index fails.
    pub corrupt_frame: Option<usize>,
    /// The decoder stops after emitting this many frames.
    pub truncate_after: Option<usize>,
}

impl SyntheticVideo {
    pub fn new(fps: f64, frame_count: usize) -> Self {
        Self {
            fps,
            frame_count,
            width: 4,
            height: 2,
            corrupt_frame: None,
            truncate_after: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_corrupt_frame(mut self, index: usize) -> Self {
        self.corrupt_frame = Some(index);
        self
    }

    pub fn truncated_after(mut self, frames: usize) -> Self {
        self.truncate_after = Some(frames);
        self
    }
}

/// Backend serving [`SyntheticVideo`] clips registered under fake paths.
#[derive(Debug, Default, Clone)]
pub struct SyntheticBackend {
    videos: HashMap<PathBuf, SyntheticVideo>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, path: impl Into<PathBuf>, video: SyntheticVideo) -> Self {
        self.videos.insert(path.into(), video);
        self
    }
}

impl VideoBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, VideoError> {
        let video = self
            .videos
            .get(path)
            .cloned()
            .ok_or_else(|| VideoError::open(path, "no such file"))?;
        Ok(Box::new(SyntheticSource { video }))
    }
}

struct SyntheticSource {
    video: SyntheticVideo,
}

impl VideoSource for SyntheticSource {
    fn avg_fps(&self) -> f64 {
        self.video.fps
    }

    fn frame_count(&self) -> usize {
        self.video.frame_count
    }

    fn get_batch(&mut self, indices: &[usize]) -> Result<Vec<RgbImage>, VideoError> {
        let limit = self
            .video
            .truncate_after
            .unwrap_or(self.video.frame_count)
            .min(self.video.frame_count);
        let mut frames = Vec::with_capacity(indices.len());
        for &index in indices {
            if index >= limit {
                break;
            }
            if self.video.corrupt_frame == Some(index) {
                return Err(VideoError::decode(index, "corrupt packet"));
            }
            frames.push(render_frame(index, self.video.width, self.video.height));
        }
        Ok(frames)
    }
}

fn render_frame(index: usize, width: u32, height: u32) -> RgbImage {
    let pixel = Rgb([
        (index & 0xff) as u8,
        ((index >> 8) & 0xff) as u8,
        ((index >> 16) & 0xff) as u8,
    ]);
    RgbImage::from_pixel(width, height, pixel)
}

/// Recover the frame index a synthetic frame was rendered from.
pub fn frame_index_of(image: &RgbImage) -> usize {
    let [r, g, b] = image.get_pixel(0, 0).0;
    usize::from(r) | usize::from(g) << 8 | usize::from(b) << 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_encode_their_index() {
        let backend = SyntheticBackend::new().with_video("clip.mp4", SyntheticVideo::new(30.0, 100_000));
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();
        let frames = source.get_batch(&[0, 255, 256, 70_000]).unwrap();
        let decoded: Vec<usize> = frames.iter().map(frame_index_of).collect();
        assert_eq!(decoded, vec![0, 255, 256, 70_000]);
    }

    #[test]
    fn unknown_path_fails_to_open() {
        let backend = SyntheticBackend::new();
        assert!(matches!(
            backend.open(Path::new("missing.mp4")),
            Err(VideoError::Open { .. })
        ));
    }
}
