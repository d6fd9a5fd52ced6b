//! reelchat configuration schema.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills the
//! gaps and the typed accessors at the bottom turn sections into runtime values.

use serde::{Deserialize, Serialize};

use reelchat_core::{Device, GenerationParams, SamplingConfig, VideoError};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for reelchat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReelChatConfig {
    /// Frame budget and temporal id granularity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingSection>,

    /// Decoder binaries and per-request video defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSection>,

    /// Inference provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSection>,

    /// Text generation parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationSection>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// HTTP API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingSection {
    /// Frames per call before packing multiplies capacity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<usize>,
    /// Frames folded into one temporal pack (1-6)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packing: Option<usize>,
    /// Temporal id bucket width in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_scale: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSection {
    /// Sampling rate used when a request does not specify one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choose_fps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<String>,
    /// "jpeg" | "png"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    /// "openai" | "ollama" | "mock"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// "auto" | "cpu" | "cuda[:N]" | "xpu[:N]"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling NDJSON logs; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

impl ReelChatConfig {
    /// Encoder configuration; missing fields fall back to the model defaults.
    pub fn sampling_config(&self) -> Result<SamplingConfig, VideoError> {
        let s = self.sampling.clone().unwrap_or_default();
        SamplingConfig::new(
            s.max_frames.unwrap_or(SamplingConfig::DEFAULT_MAX_FRAMES),
            s.max_packing.unwrap_or(SamplingConfig::DEFAULT_MAX_PACKING),
            s.time_scale.unwrap_or(SamplingConfig::DEFAULT_TIME_SCALE),
        )
    }

    pub fn generation_params(&self) -> GenerationParams {
        let defaults = GenerationParams::default();
        let g = self.generation.clone().unwrap_or_default();
        GenerationParams {
            max_new_tokens: g.max_new_tokens.unwrap_or(defaults.max_new_tokens),
            temperature: g.temperature.unwrap_or(defaults.temperature),
            top_p: g.top_p.unwrap_or(defaults.top_p),
        }
    }

    pub fn device(&self) -> Result<Device, String> {
        match self.model.as_ref().and_then(|m| m.device.as_deref()) {
            Some(device) => device.parse(),
            None => Ok(Device::Auto),
        }
    }

    pub fn choose_fps(&self) -> u32 {
        self.video
            .as_ref()
            .and_then(|v| v.choose_fps)
            .unwrap_or(crate::defaults::DEFAULT_CHOOSE_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
sampling:
  maxFrames: 120
  maxPacking: 9
  timeScale: 0.2
model:
  provider: ollama
  model: llava
  device: cuda:1
generation:
  temperature: 0.2
"#;
        let cfg: ReelChatConfig = serde_yaml::from_str(yaml).unwrap();
        let sampling = cfg.sampling_config().unwrap();
        assert_eq!(sampling.max_frames(), 120);
        assert_eq!(sampling.max_packing(), 6);
        assert_eq!(sampling.time_scale(), 0.2);
        assert_eq!(cfg.device().unwrap(), Device::Cuda(1));

        let generation = cfg.generation_params();
        assert_eq!(generation.temperature, 0.2);
        assert_eq!(generation.max_new_tokens, 2048);
    }

    #[test]
    fn empty_config_uses_model_defaults() {
        let cfg = ReelChatConfig::default();
        assert_eq!(cfg.sampling_config().unwrap(), SamplingConfig::default());
        assert_eq!(cfg.device().unwrap(), Device::Auto);
        assert_eq!(cfg.choose_fps(), 5);
    }
}
