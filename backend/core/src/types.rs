use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VideoError;

/// Discretized timestamp bucket assigned to a sampled frame.
pub type TemporalId = u32;

/// Consecutive temporal ids the model folds into one temporally-compressed unit.
pub type TemporalGroup = Vec<TemporalId>;

/// Frame budget and timestamp granularity used by the video encoder.
///
/// Immutable once built. `max_packing` is clamped into `1..=6`, `max_frames`
/// must be positive and `time_scale` must be a positive, finite number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    max_frames: usize,
    max_packing: usize,
    time_scale: f64,
}

impl SamplingConfig {
    pub const DEFAULT_MAX_FRAMES: usize = 180;
    pub const DEFAULT_MAX_PACKING: usize = 3;
    pub const DEFAULT_TIME_SCALE: f64 = 0.1;
    /// Upper bound the consuming model accepts for a single temporal pack.
    pub const PACKING_LIMIT: usize = 6;

    pub fn new(max_frames: usize, max_packing: usize, time_scale: f64) -> Result<Self, VideoError> {
        if max_frames == 0 {
            return Err(VideoError::InvalidArgument(
                "max_frames must be greater than zero".into(),
            ));
        }
        if !(time_scale.is_finite() && time_scale > 0.0) {
            return Err(VideoError::InvalidArgument(format!(
                "time_scale must be a positive number of seconds, got {time_scale}"
            )));
        }
        Ok(Self {
            max_frames,
            max_packing: max_packing.clamp(1, Self::PACKING_LIMIT),
            time_scale,
        })
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn max_packing(&self) -> usize {
        self.max_packing
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Hard ceiling on frames returned by a single encode.
    pub fn frame_ceiling(&self) -> usize {
        self.max_frames * self.max_packing
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_frames: Self::DEFAULT_MAX_FRAMES,
            max_packing: Self::DEFAULT_MAX_PACKING,
            time_scale: Self::DEFAULT_TIME_SCALE,
        }
    }
}

/// Basic stream properties of a video container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub fps: f64,
    pub duration_seconds: f64,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
}

/// Sampling parameters for text generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 2048,
            temperature: 0.7,
            top_p: 0.8,
        }
    }
}

/// Accelerator the inference collaborator should run on.
///
/// Passed explicitly to providers; nothing in this workspace mutates
/// process-wide state to pick a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda(u32),
    Xpu(u32),
}

impl Device {
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(n) => write!(f, "cuda:{n}"),
            Device::Xpu(n) => write!(f, "xpu:{n}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (kind, ordinal) = match s.split_once(':') {
            Some((kind, n)) => {
                let n = n
                    .parse::<u32>()
                    .map_err(|_| format!("invalid device ordinal in '{s}'"))?;
                (kind.to_string(), Some(n))
            }
            None => (s.clone(), None),
        };
        match (kind.as_str(), ordinal) {
            ("auto", None) => Ok(Device::Auto),
            ("cpu", None) => Ok(Device::Cpu),
            ("cuda" | "gpu", n) => Ok(Device::Cuda(n.unwrap_or(0))),
            ("xpu", n) => Ok(Device::Xpu(n.unwrap_or(0))),
            _ => Err(format!("unknown device '{s}' (expected auto, cpu, cuda[:N] or xpu[:N])")),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}
