//! Config defaults: applies sensible default values to parsed config.

use reelchat_core::{GenerationParams, SamplingConfig};

use crate::schema::{
    GenerationSection, LoggingConfig, ModelSection, ReelChatConfig, SamplingSection,
    ServerConfig, VideoSection,
};

/// Default sampling rate (frames per second) for chat requests.
pub const DEFAULT_CHOOSE_FPS: u32 = 5;

/// Default inference provider.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Default model served behind the OpenAI-compatible endpoint.
pub const DEFAULT_MODEL: &str = "openbmb/MiniCPM-V-4_5";

/// Default endpoint for a locally hosted OpenAI-compatible server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// Default HTTP API port.
pub const DEFAULT_SERVER_PORT: u16 = 7860;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: ReelChatConfig) -> ReelChatConfig {
    let config = apply_sampling_defaults(config);
    let config = apply_video_defaults(config);
    let config = apply_model_defaults(config);
    let config = apply_generation_defaults(config);
    let config = apply_logging_defaults(config);
    apply_server_defaults(config)
}

fn apply_sampling_defaults(mut config: ReelChatConfig) -> ReelChatConfig {
    let sampling = config.sampling.get_or_insert_with(SamplingSection::default);
    sampling.max_frames.get_or_insert(SamplingConfig::DEFAULT_MAX_FRAMES);
    sampling.max_packing.get_or_insert(SamplingConfig::DEFAULT_MAX_PACKING);
    sampling.time_scale.get_or_insert(SamplingConfig::DEFAULT_TIME_SCALE);
    config
}

fn apply_video_defaults(mut config: ReelChatConfig) -> ReelChatConfig {
    let video = config.video.get_or_insert_with(VideoSection::default);
    video.choose_fps.get_or_insert(DEFAULT_CHOOSE_FPS);
    video.ffmpeg_path.get_or_insert_with(|| "ffmpeg".to_string());
    video.ffprobe_path.get_or_insert_with(|| "ffprobe".to_string());
    video.frame_format.get_or_insert_with(|| "jpeg".to_string());
    video.jpeg_quality.get_or_insert(85);
    config
}

fn apply_model_defaults(mut config: ReelChatConfig) -> ReelChatConfig {
    let model = config.model.get_or_insert_with(ModelSection::default);
    let provider = model
        .provider
        .get_or_insert_with(|| DEFAULT_PROVIDER.to_string())
        .clone();
    if provider == DEFAULT_PROVIDER {
        model.base_url.get_or_insert_with(|| DEFAULT_BASE_URL.to_string());
        model.model.get_or_insert_with(|| DEFAULT_MODEL.to_string());
    }
    model.device.get_or_insert_with(|| "auto".to_string());
    config
}

fn apply_generation_defaults(mut config: ReelChatConfig) -> ReelChatConfig {
    let defaults = GenerationParams::default();
    let generation = config.generation.get_or_insert_with(GenerationSection::default);
    generation.max_new_tokens.get_or_insert(defaults.max_new_tokens);
    generation.temperature.get_or_insert(defaults.temperature);
    generation.top_p.get_or_insert(defaults.top_p);
    config
}

/// Ensure logging.level is set.
fn apply_logging_defaults(mut config: ReelChatConfig) -> ReelChatConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some("info".to_string());
    }
    config
}

fn apply_server_defaults(mut config: ReelChatConfig) -> ReelChatConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| "127.0.0.1".to_string());
    server.port.get_or_insert(DEFAULT_SERVER_PORT);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let cfg = apply_all_defaults(ReelChatConfig::default());
        assert_eq!(cfg.sampling.as_ref().unwrap().max_frames, Some(180));
        assert_eq!(cfg.video.as_ref().unwrap().choose_fps, Some(5));
        assert_eq!(cfg.model.as_ref().unwrap().model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(cfg.logging.as_ref().unwrap().level.as_deref(), Some("info"));
        assert_eq!(cfg.server.as_ref().unwrap().port, Some(7860));
    }

    #[test]
    fn keeps_explicit_values() {
        let mut cfg = ReelChatConfig::default();
        cfg.model = Some(ModelSection {
            provider: Some("ollama".into()),
            model: Some("llava".into()),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        let model = cfg.model.unwrap();
        assert_eq!(model.model.as_deref(), Some("llava"));
        // OpenAI endpoint defaults do not leak into other providers.
        assert!(model.base_url.is_none());
    }
}
