//! Config validation: schema checks with user-friendly error messages.

use reelchat_core::{Device, SamplingConfig};
use thiserror::Error;

use crate::schema::ReelChatConfig;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &ReelChatConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_sampling(config, &mut report);
    validate_video(config, &mut report);
    validate_model(config, &mut report);
    validate_generation(config, &mut report);
    report
}

fn validate_sampling(config: &ReelChatConfig, report: &mut ValidationReport) {
    let Some(sampling) = &config.sampling else { return };
    if sampling.max_frames == Some(0) {
        report.error("sampling.maxFrames", "maxFrames must be at least 1");
    }
    if let Some(packing) = sampling.max_packing {
        if packing == 0 || packing > SamplingConfig::PACKING_LIMIT {
            report.warn(
                "sampling.maxPacking",
                format!(
                    "maxPacking {packing} is outside 1..={}; it will be clamped",
                    SamplingConfig::PACKING_LIMIT
                ),
            );
        }
    }
    if let Some(scale) = sampling.time_scale {
        if !(scale.is_finite() && scale > 0.0) {
            report.error("sampling.timeScale", "timeScale must be a positive number of seconds");
        }
    }
}

fn validate_video(config: &ReelChatConfig, report: &mut ValidationReport) {
    let Some(video) = &config.video else { return };
    if video.choose_fps == Some(0) {
        report.error("video.chooseFps", "chooseFps must be at least 1");
    }
    if let Some(format) = &video.frame_format {
        if !matches!(format.to_lowercase().as_str(), "jpeg" | "jpg" | "png") {
            report.error("video.frameFormat", format!("Unknown frame format '{format}'"));
        }
    }
    if let Some(quality) = video.jpeg_quality {
        if quality == 0 || quality > 100 {
            report.error("video.jpegQuality", "jpegQuality must be between 1 and 100");
        }
    }
    for (path, binary) in [
        ("video.ffmpegPath", &video.ffmpeg_path),
        ("video.ffprobePath", &video.ffprobe_path),
    ] {
        if binary.as_deref().is_some_and(|b| b.trim().is_empty()) {
            report.error(path, "Binary path cannot be empty");
        }
    }
}

fn validate_model(config: &ReelChatConfig, report: &mut ValidationReport) {
    let Some(model) = &config.model else { return };
    let provider = model.provider.as_deref().unwrap_or("openai").to_lowercase();
    if !matches!(
        provider.as_str(),
        "openai" | "openai-compatible" | "vllm" | "ollama" | "mock"
    ) {
        report.error("model.provider", format!("Unknown provider '{provider}'"));
    }
    if provider != "mock" && model.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
        report.error("model.model", "A model name is required");
    }
    if let Some(url) = &model.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error("model.baseUrl", "baseUrl must start with http:// or https://");
        }
    }
    if let Some(device) = &model.device {
        if let Err(e) = device.parse::<Device>() {
            report.error("model.device", e);
        }
    }
}

fn validate_generation(config: &ReelChatConfig, report: &mut ValidationReport) {
    let Some(generation) = &config.generation else { return };
    if generation.max_new_tokens == Some(0) {
        report.error("generation.maxNewTokens", "maxNewTokens must be at least 1");
    }
    if let Some(temp) = generation.temperature {
        if !(0.0..=2.0).contains(&temp) {
            report.warn("generation.temperature", "temperature is usually between 0 and 2");
        }
    }
    if let Some(top_p) = generation.top_p {
        if !(top_p > 0.0 && top_p <= 1.0) {
            report.error("generation.topP", "topP must be in (0, 1]");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{ModelSection, SamplingSection, VideoSection};

    #[test]
    fn defaults_are_valid() {
        let report = validate(&apply_all_defaults(ReelChatConfig::default()));
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn oversized_packing_is_a_warning() {
        let cfg = ReelChatConfig {
            sampling: Some(SamplingSection {
                max_packing: Some(9),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "sampling.maxPacking");
    }

    #[test]
    fn rejects_non_positive_time_scale_and_zero_fps() {
        let cfg = ReelChatConfig {
            sampling: Some(SamplingSection {
                time_scale: Some(0.0),
                max_frames: Some(0),
                ..Default::default()
            }),
            video: Some(VideoSection {
                choose_fps: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"sampling.timeScale"));
        assert!(paths.contains(&"sampling.maxFrames"));
        assert!(paths.contains(&"video.chooseFps"));
    }

    #[test]
    fn rejects_unknown_provider_and_device() {
        let cfg = ReelChatConfig {
            model: Some(ModelSection {
                provider: Some("bedrock".into()),
                model: Some("x".into()),
                device: Some("tpu".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert_eq!(report.errors.len(), 2);
    }
}
