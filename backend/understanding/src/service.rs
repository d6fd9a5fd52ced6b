//! Video chat orchestration.
//!
//! Validates and encodes a video on the blocking pool, compresses the frames,
//! and asks the configured vision provider about them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use reelchat_core::{
    Device, GenerationParams, ReelError, VideoChatRequest, VideoChatResponse, VideoError,
    VideoInfo, VisionChatProvider,
};
use reelchat_logging::{ChatEvent, EventLogger};
use reelchat_media::{encode_frames, validate_video_file, EncodedVideo, FrameFormat, VideoEncoder};

/// Per-service defaults for chat calls.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub generation: GenerationParams,
    pub device: Device,
    pub frame_format: FrameFormat,
    /// Sampling rate used when a caller does not pick one.
    pub default_fps: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            generation: GenerationParams::default(),
            device: Device::Auto,
            frame_format: FrameFormat::default(),
            default_fps: 5,
        }
    }
}

/// One entry of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchAnswer {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchAnswer {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Answers questions about videos.
#[derive(Clone)]
pub struct VideoChatService {
    encoder: Arc<VideoEncoder>,
    provider: Arc<dyn VisionChatProvider>,
    options: ChatOptions,
    session_id: String,
}

impl VideoChatService {
    pub fn new(
        encoder: Arc<VideoEncoder>,
        provider: Arc<dyn VisionChatProvider>,
        options: ChatOptions,
    ) -> Self {
        let session_id = Uuid::new_v4().to_string();
        info!(
            session = %session_id,
            provider = provider.name(),
            model = provider.model(),
            device = %options.device,
            "Video chat service configured"
        );
        Self {
            encoder,
            provider,
            options,
            session_id,
        }
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stream properties of a video.
    pub async fn video_info(&self, path: &Path) -> Result<VideoInfo> {
        let encoder = Arc::clone(&self.encoder);
        let path = path.to_path_buf();
        let info = tokio::task::spawn_blocking(move || -> Result<VideoInfo, VideoError> {
            validate_video_file(&path)?;
            encoder.video_info(&path)
        })
        .await
        .context("Video info task panicked")??;
        Ok(info)
    }

    /// Validate and encode a video into frames and temporal groups.
    pub async fn process_video(
        &self,
        path: &Path,
        choose_fps: Option<u32>,
        force_packing: Option<usize>,
    ) -> Result<EncodedVideo> {
        let choose_fps = choose_fps.unwrap_or(self.options.default_fps);
        let encoder = Arc::clone(&self.encoder);
        let owned: PathBuf = path.to_path_buf();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || -> Result<EncodedVideo, VideoError> {
            validate_video_file(&owned)?;
            encoder.encode(&owned, choose_fps, force_packing)
        })
        .await
        .context("Video encode task panicked")?;

        let encoded = match result {
            Ok(encoded) => encoded,
            Err(e) => {
                EventLogger::log_event(&self.session_id, ChatEvent::Error { error_msg: e.to_string() });
                return Err(e).with_context(|| format!("Failed to process video {}", path.display()));
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        EventLogger::log_event(
            &self.session_id,
            ChatEvent::VideoEncoded {
                path: path.display().to_string(),
                frames: encoded.frame_count(),
                groups: encoded.temporal_groups.len(),
                packing: encoded.packing(),
                elapsed_ms,
            },
        );
        info!(elapsed_ms, frames = encoded.frame_count(), "Video processed");
        Ok(encoded)
    }

    /// Encode `path` and ask one question about it.
    pub async fn chat_with_video(
        &self,
        path: &Path,
        question: &str,
        choose_fps: Option<u32>,
        force_packing: Option<usize>,
    ) -> Result<VideoChatResponse> {
        let start = Instant::now();
        let encoded = self.process_video(path, choose_fps, force_packing).await?;
        let response = self.chat_with_frames(&encoded, question).await?;
        info!(total_ms = start.elapsed().as_millis() as u64, "Video chat finished");
        Ok(response)
    }

    /// Ask a question about an already encoded video.
    pub async fn chat_with_frames(
        &self,
        encoded: &EncodedVideo,
        question: &str,
    ) -> Result<VideoChatResponse> {
        let request = self.build_request(encoded, question)?;

        EventLogger::log_event(
            &self.session_id,
            ChatEvent::Question {
                question: question.to_string(),
            },
        );

        match self.provider.chat(&request).await {
            Ok(response) => {
                info!(
                    provider = %response.provider,
                    latency_ms = response.latency_ms,
                    tokens = response.tokens_used,
                    "Inference finished"
                );
                EventLogger::log_event(
                    &self.session_id,
                    ChatEvent::Answer {
                        provider: response.provider.clone(),
                        model: response.model.clone(),
                        content: response.content.clone(),
                        latency_ms: response.latency_ms,
                    },
                );
                Ok(response)
            }
            Err(e) => {
                EventLogger::log_event(&self.session_id, ChatEvent::Error { error_msg: e.to_string() });
                Err(ReelError::Provider {
                    provider: self.provider.name().to_string(),
                    message: format!("{e:#}"),
                }
                .into())
            }
        }
    }

    /// Encode once, then ask every question.
    ///
    /// A failing question is recorded in its entry and the batch moves on.
    pub async fn batch_chat(
        &self,
        path: &Path,
        questions: &[String],
        choose_fps: Option<u32>,
        force_packing: Option<usize>,
    ) -> Result<Vec<BatchAnswer>> {
        let encoded = self.process_video(path, choose_fps, force_packing).await?;

        let mut answers = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            info!(current = i + 1, total = questions.len(), "Answering batch question");
            let entry = match self.chat_with_frames(&encoded, question).await {
                Ok(response) => BatchAnswer {
                    question: question.clone(),
                    answer: Some(response.content),
                    error: None,
                },
                Err(e) => {
                    warn!(question = %question, error = %e, "Batch question failed");
                    BatchAnswer {
                        question: question.clone(),
                        answer: None,
                        error: Some(format!("{e:#}")),
                    }
                }
            };
            answers.push(entry);
        }

        let ok = answers.iter().filter(|a| a.is_ok()).count();
        info!(succeeded = ok, total = answers.len(), "Batch finished");
        Ok(answers)
    }

    /// Provider, device and encoder configuration as JSON.
    pub fn system_info(&self) -> Value {
        let config = self.encoder.config();
        json!({
            "session": self.session_id,
            "provider": self.provider.name(),
            "model": self.provider.model(),
            "device": self.options.device.to_string(),
            "decoder": self.encoder.backend_name(),
            "frameFormat": self.options.frame_format.to_string(),
            "defaultFps": self.options.default_fps,
            "generation": self.options.generation,
            "videoEncoder": {
                "maxFrames": config.max_frames(),
                "maxPacking": config.max_packing(),
                "timeScale": config.time_scale(),
            }
        })
    }

    fn build_request(&self, encoded: &EncodedVideo, question: &str) -> Result<VideoChatRequest> {
        let images = encode_frames(&encoded.frames, self.options.frame_format)?;
        let request = VideoChatRequest {
            images,
            temporal_groups: encoded.temporal_groups.clone(),
            question: question.to_string(),
            generation: self.options.generation,
            device: self.options.device,
        };
        if request.images.len() != request.temporal_id_count() {
            return Err(VideoError::Consistency {
                frames: request.images.len(),
                temporal_ids: request.temporal_id_count(),
            }
            .into());
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockVisionProvider;
    use reelchat_core::SamplingConfig;
    use reelchat_media::{SyntheticBackend, SyntheticVideo};

    // Synthetic paths must also pass file validation, so back them with real temp files.
    fn service_with(
        provider: Arc<MockVisionProvider>,
        video: SyntheticVideo,
    ) -> (VideoChatService, tempfile::NamedTempFile) {
        let file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        let backend = SyntheticBackend::new().with_video(file.path(), video);
        let encoder = Arc::new(VideoEncoder::new(SamplingConfig::default(), Arc::new(backend)));
        let service = VideoChatService::new(encoder, provider, ChatOptions::default());
        (service, file)
    }

    #[tokio::test]
    async fn chat_sends_aligned_frames_and_groups() {
        let provider = Arc::new(MockVisionProvider::new("mock").with_response("A cat."));
        let (service, file) = service_with(provider.clone(), SyntheticVideo::new(30.0, 300));

        let response = service
            .chat_with_video(file.path(), "What animal is shown?", Some(3), Some(2))
            .await
            .unwrap();
        assert_eq!(response.content, "A cat.");

        let seen = provider.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].image_count, 30);
        assert_eq!(seen[0].temporal_groups.len(), 15);
        assert_eq!(seen[0].temporal_groups[0], vec![2, 5]);
        assert_eq!(seen[0].question, "What animal is shown?");
    }

    #[tokio::test]
    async fn default_fps_applies_when_unspecified() {
        let provider = Arc::new(MockVisionProvider::new("mock"));
        let (service, file) = service_with(provider.clone(), SyntheticVideo::new(30.0, 300));

        let encoded = service.process_video(file.path(), None, None).await.unwrap();
        // 10 s at the default 5 fps.
        assert_eq!(encoded.frame_count(), 50);
    }

    #[tokio::test]
    async fn batch_encodes_once_and_survives_failures() {
        let provider = Arc::new(MockVisionProvider::new("mock").failing_on("boom"));
        let (service, file) = service_with(provider.clone(), SyntheticVideo::new(30.0, 18_000));

        let questions = vec![
            "What happens first?".to_string(),
            "boom".to_string(),
            "How does it end?".to_string(),
        ];
        let answers = service
            .batch_chat(file.path(), &questions, Some(5), None)
            .await
            .unwrap();

        assert_eq!(answers.len(), 3);
        assert!(answers[0].is_ok());
        assert!(!answers[1].is_ok());
        assert!(answers[2].is_ok());
        assert!(provider
            .requests()
            .iter()
            .all(|r| r.image_count == 540 && r.temporal_groups.len() == 180));
    }

    #[tokio::test]
    async fn missing_video_fails_before_inference() {
        let provider = Arc::new(MockVisionProvider::new("mock"));
        let (service, _file) = service_with(provider.clone(), SyntheticVideo::new(30.0, 300));

        let err = service
            .chat_with_video(Path::new("/no/such/clip.mp4"), "Anything?", None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VideoError>(),
            Some(VideoError::Open { .. })
        ));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_typed() {
        let provider = Arc::new(MockVisionProvider::new("mock").failing_on("boom"));
        let (service, file) = service_with(provider, SyntheticVideo::new(30.0, 300));

        let err = service
            .chat_with_video(file.path(), "boom", Some(2), None)
            .await
            .unwrap_err();
        match err.downcast_ref::<ReelError>() {
            Some(ReelError::Provider { provider, .. }) => assert_eq!(provider, "mock"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn video_info_reports_stream() {
        let provider = Arc::new(MockVisionProvider::new("mock"));
        let (service, file) = service_with(provider, SyntheticVideo::new(25.0, 250).with_size(8, 6));

        let info = service.video_info(file.path()).await.unwrap();
        assert_eq!(info.total_frames, 250);
        assert_eq!((info.width, info.height), (8, 6));
    }

    #[test]
    fn system_info_lists_encoder_config() {
        let provider = Arc::new(MockVisionProvider::new("mock"));
        let (service, _file) = service_with(provider, SyntheticVideo::new(30.0, 300));
        let info = service.system_info();
        assert_eq!(info["provider"], "mock");
        assert_eq!(info["videoEncoder"]["maxPacking"], 3);
        assert_eq!(info["device"], "auto");
    }
}
