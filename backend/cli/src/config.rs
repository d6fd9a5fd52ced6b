use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Map, Value};
use tracing::info;

use reelchat_config::{config_dir, config_file_path, load_and_prepare, ReelChatConfig};
use reelchat_media::{FfmpegBackend, FrameFormat, VideoEncoder};
use reelchat_understanding::{build_provider, ChatOptions, ProviderSettings, VideoChatService};

/// Settings that may be overridden on the command line for any subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Config file (default: $REELCHAT_CONFIG_DIR/config.yaml or ~/.reelchat/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Inference provider: openai, ollama or mock
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model name served by the provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Provider endpoint
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Compute device: auto, cpu, cuda[:N] or xpu[:N]
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Frames per inference call before packing
    #[arg(long, global = true)]
    pub max_frames: Option<usize>,

    /// Maximum frames folded into one temporal pack (1-6)
    #[arg(long, global = true)]
    pub max_packing: Option<usize>,

    /// Temporal id granularity in seconds
    #[arg(long, global = true)]
    pub time_scale: Option<f64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl Overrides {
    /// Express the flags that were given as a JSON merge patch.
    pub fn to_patch(&self) -> Option<Value> {
        let mut patch = Map::new();
        let mut section = |name: &str, fields: Vec<(&str, Option<Value>)>| {
            let fields: Map<String, Value> = fields
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
                .collect();
            if !fields.is_empty() {
                patch.insert(name.to_string(), Value::Object(fields));
            }
        };

        section(
            "model",
            vec![
                ("provider", self.provider.clone().map(Value::from)),
                ("model", self.model.clone().map(Value::from)),
                ("baseUrl", self.base_url.clone().map(Value::from)),
                ("device", self.device.clone().map(Value::from)),
            ],
        );
        section(
            "sampling",
            vec![
                ("maxFrames", self.max_frames.map(Value::from)),
                ("maxPacking", self.max_packing.map(Value::from)),
                ("timeScale", self.time_scale.map(Value::from)),
            ],
        );
        section("logging", vec![("level", self.log_level.clone().map(Value::from))]);

        if patch.is_empty() {
            None
        } else {
            Some(Value::Object(patch))
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| config_file_path(&config_dir()))
    }
}

/// Load the config file and fold command-line overrides into it.
pub async fn load_effective(overrides: &Overrides) -> Result<ReelChatConfig> {
    let path = overrides.config_path();
    let patch = overrides.to_patch();
    load_and_prepare(&path, patch.as_ref())
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Assemble the encoder, provider and chat service described by `config`.
pub fn build_service(config: &ReelChatConfig) -> Result<VideoChatService> {
    let sampling = config.sampling_config()?;
    let video = config.video.clone().unwrap_or_default();

    let backend = FfmpegBackend::new().with_binaries(
        video.ffmpeg_path.as_deref().unwrap_or("ffmpeg"),
        video.ffprobe_path.as_deref().unwrap_or("ffprobe"),
    );
    let encoder = Arc::new(VideoEncoder::new(sampling, Arc::new(backend)));

    let provider = build_provider(&provider_settings(config)?)?;

    let mut frame_format: FrameFormat = video
        .frame_format
        .as_deref()
        .unwrap_or("jpeg")
        .parse()
        .map_err(anyhow::Error::msg)?;
    if let Some(quality) = video.jpeg_quality {
        frame_format = frame_format.with_quality(quality);
    }

    let options = ChatOptions {
        generation: config.generation_params(),
        device: config.device().map_err(anyhow::Error::msg)?,
        frame_format,
        default_fps: config.choose_fps(),
    };
    info!(
        max_frames = sampling.max_frames(),
        max_packing = sampling.max_packing(),
        time_scale = sampling.time_scale(),
        "Video encoder configured"
    );
    Ok(VideoChatService::new(encoder, provider, options))
}

pub fn provider_settings(config: &ReelChatConfig) -> Result<ProviderSettings> {
    let model = config.model.clone().unwrap_or_default();
    Ok(ProviderSettings {
        kind: model
            .provider
            .as_deref()
            .unwrap_or("openai")
            .parse()
            .map_err(anyhow::Error::msg)?,
        model: model.model.unwrap_or_default(),
        base_url: model.base_url,
        api_key: model.api_key,
    })
}

/// Questions from a batch file: one per line, blank lines and `#` comments skipped.
pub async fn read_questions(path: &Path) -> Result<Vec<String>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read questions file {}", path.display()))?;
    Ok(parse_questions(&raw))
}

pub fn parse_questions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Redacted view of the effective config for `config show`.
pub fn redacted_view(config: &ReelChatConfig) -> Result<Value> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    Ok(json!({ "config": reelchat_config::redact(&value) }))
}
