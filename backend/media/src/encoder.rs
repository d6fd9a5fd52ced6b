//! Video-to-frame-sequence encoder.
//!
//! Turns a video into a bounded list of RGB stills plus temporal id groups
//! aligned one to one with those stills.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, error, info};

use reelchat_core::{SamplingConfig, TemporalGroup, TemporalId, VideoError, VideoInfo};

use crate::ffmpeg::FfmpegBackend;
use crate::plan::{uniform_sample, SamplingPlan};
use crate::source::{VideoBackend, VideoSource};
use crate::temporal::{group_ids, temporal_ids, TimeAxis};

/// A decoded still and where it came from.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub index: usize,
    /// Seconds from the start of the video (`index / fps`).
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Output of [`VideoEncoder::encode`].
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub fps: f64,
    pub duration_seconds: f64,
    pub total_frames: usize,
    pub plan: SamplingPlan,
    pub frames: Vec<SampledFrame>,
    pub temporal_groups: Vec<TemporalGroup>,
}

impl EncodedVideo {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn packing(&self) -> usize {
        self.plan.packing
    }

    pub fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index).collect()
    }

    pub fn temporal_ids(&self) -> Vec<TemporalId> {
        self.temporal_groups.iter().flatten().copied().collect()
    }

    pub fn summary(&self) -> EncodeSummary {
        EncodeSummary {
            fps: self.fps,
            duration_seconds: self.duration_seconds,
            total_frames: self.total_frames,
            plan: self.plan,
            frame_count: self.frames.len(),
            group_count: self.temporal_groups.len(),
            temporal_groups: self.temporal_groups.clone(),
        }
    }

    /// Split into the two aligned sequences handed to the model.
    pub fn into_parts(self) -> (Vec<RgbImage>, Vec<TemporalGroup>) {
        let images = self.frames.into_iter().map(|f| f.image).collect();
        (images, self.temporal_groups)
    }
}

/// Serializable description of an encode, without pixel data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeSummary {
    pub fps: f64,
    pub duration_seconds: f64,
    pub total_frames: usize,
    pub plan: SamplingPlan,
    pub frame_count: usize,
    pub group_count: usize,
    pub temporal_groups: Vec<TemporalGroup>,
}

/// Quick look at a video before committing to an encode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPreview {
    pub duration: String,
    pub fps: String,
    pub total_frames: usize,
    pub resolution: String,
    pub estimated_sample_frames: usize,
}

impl From<&VideoInfo> for VideoPreview {
    fn from(info: &VideoInfo) -> Self {
        Self {
            duration: format!("{:.2}s", info.duration_seconds),
            fps: format!("{:.2}", info.fps),
            total_frames: info.total_frames,
            resolution: format!("{}x{}", info.width, info.height),
            estimated_sample_frames: ((info.duration_seconds * 3.0) as usize).min(180),
        }
    }
}

/// Samples videos into frame and temporal id sequences.
///
/// Holds only immutable configuration and a backend, so one encoder can be
/// shared across threads. Each call opens its own handle.
#[derive(Clone)]
pub struct VideoEncoder {
    config: SamplingConfig,
    backend: Arc<dyn VideoBackend>,
}

impl VideoEncoder {
    pub fn new(config: SamplingConfig, backend: Arc<dyn VideoBackend>) -> Self {
        info!(
            backend = backend.name(),
            max_frames = config.max_frames(),
            max_packing = config.max_packing(),
            time_scale = config.time_scale(),
            "Video encoder ready"
        );
        Self { config, backend }
    }

    pub fn with_ffmpeg(config: SamplingConfig) -> Self {
        Self::new(config, Arc::new(FfmpegBackend::new()))
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Frame rate, duration, frame count and resolution of a video.
    ///
    /// Resolution is read from the first decoded frame.
    pub fn video_info(&self, path: &Path) -> Result<VideoInfo, VideoError> {
        let mut source = self.backend.open(path)?;
        let (fps, total_frames) = stream_stats(&*source, path)?;
        let first = source
            .get_batch(&[0])?
            .into_iter()
            .next()
            .ok_or_else(|| VideoError::open(path, "no decodable frames"))?;
        Ok(VideoInfo {
            fps,
            duration_seconds: total_frames as f64 / fps,
            total_frames,
            width: first.width(),
            height: first.height(),
        })
    }

    /// Sample `path` at roughly `choose_fps` frames per second.
    ///
    /// Returns stills in ascending index order together with their temporal
    /// id groups. Any decode failure fails the whole call.
    pub fn encode(
        &self,
        path: &Path,
        choose_fps: u32,
        force_packing: Option<usize>,
    ) -> Result<EncodedVideo, VideoError> {
        if choose_fps == 0 {
            return Err(VideoError::InvalidArgument(
                "sampling rate must be at least 1 frame per second".into(),
            ));
        }

        let mut source = self.backend.open(path)?;
        let (fps, total_frames) = stream_stats(&*source, path)?;
        let duration_seconds = total_frames as f64 / fps;

        info!(
            path = %path.display(),
            duration_secs = duration_seconds,
            fps,
            total_frames,
            "Encoding video"
        );

        let plan = SamplingPlan::compute(&self.config, fps, total_frames, choose_fps, force_packing);
        let indices = uniform_sample(total_frames, plan.frame_count);
        debug!(
            frames = plan.frame_count,
            packing = plan.packing,
            path = ?plan.path,
            forced = plan.forced,
            "Sampling plan"
        );

        let images = source.get_batch(&indices)?;
        drop(source);

        let axis = TimeAxis::new(duration_seconds, self.config.time_scale());
        let ids = temporal_ids(&indices, fps, &axis);

        if images.len() != ids.len() {
            error!(
                path = %path.display(),
                frames = images.len(),
                temporal_ids = ids.len(),
                "Frame and temporal id counts diverged"
            );
            return Err(VideoError::Consistency {
                frames: images.len(),
                temporal_ids: ids.len(),
            });
        }

        let temporal_groups = group_ids(&ids, plan.packing);
        let frames = indices
            .into_iter()
            .zip(images)
            .map(|(index, image)| SampledFrame {
                index,
                timestamp: index as f64 / fps,
                image,
            })
            .collect::<Vec<_>>();

        info!(
            frames = frames.len(),
            groups = temporal_groups.len(),
            packing = plan.packing,
            first_group = ?temporal_groups.first(),
            "Video encoded"
        );

        Ok(EncodedVideo {
            fps,
            duration_seconds,
            total_frames,
            plan,
            frames,
            temporal_groups,
        })
    }
}

fn stream_stats(source: &dyn VideoSource, path: &Path) -> Result<(f64, usize), VideoError> {
    let fps = source.avg_fps();
    if !(fps.is_finite() && fps > 0.0) {
        return Err(VideoError::open(path, format!("invalid frame rate {fps}")));
    }
    let total_frames = source.frame_count();
    if total_frames == 0 {
        return Err(VideoError::open(path, "no decodable frames"));
    }
    Ok((fps, total_frames))
}
