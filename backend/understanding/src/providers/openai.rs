use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use reelchat_core::{Device, VideoChatRequest, VideoChatResponse, VisionChatProvider};

/// OpenAI-compatible chat completions endpoint serving a vision model.
///
/// Frames go out as `image_url` data URIs in order, followed by the question.
/// Temporal id groups ride along as a top-level `temporal_ids` field for
/// servers hosting models with temporal packing.
pub struct OpenAiVisionProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiVisionProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(&self, request: &VideoChatRequest) -> Value {
        let mut content: Vec<Value> = request
            .images
            .iter()
            .map(|image| {
                json!({
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", image.mime_type, STANDARD.encode(&image.data))
                    }
                })
            })
            .collect();
        content.push(json!({ "type": "text", "text": request.question }));

        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": request.generation.max_new_tokens,
            "temperature": request.generation.temperature,
            "top_p": request.generation.top_p,
            "temporal_ids": request.temporal_groups,
            "use_image_id": false,
            "max_slice_nums": 1,
        });
        if request.device != Device::Auto {
            body["device"] = json!(request.device.to_string());
        }
        body
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

#[async_trait]
impl VisionChatProvider for OpenAiVisionProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &VideoChatRequest) -> Result<VideoChatResponse> {
        let start = Instant::now();
        let body = self.build_body(request);

        debug!(
            model = %self.model,
            images = request.images.len(),
            groups = request.temporal_groups.len(),
            "Sending request to OpenAI-compatible endpoint"
        );

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }
        let response = http
            .send()
            .await
            .context("OpenAI-compatible HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI-compatible endpoint returned {}: {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(VideoChatResponse {
            content,
            provider: "openai".to_string(),
            model: self.model.clone(),
            tokens_used: chat_response.usage.and_then(|u| u.total_tokens).unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reelchat_core::{FrameImage, GenerationParams};

    fn request(device: Device) -> VideoChatRequest {
        VideoChatRequest {
            images: vec![
                FrameImage { mime_type: "image/jpeg", data: Bytes::from_static(b"a") },
                FrameImage { mime_type: "image/jpeg", data: Bytes::from_static(b"b") },
                FrameImage { mime_type: "image/jpeg", data: Bytes::from_static(b"c") },
            ],
            temporal_groups: vec![vec![2, 5], vec![8]],
            question: "What happens?".into(),
            generation: GenerationParams::default(),
            device,
        }
    }

    #[test]
    fn body_lists_frames_before_question() {
        let provider = OpenAiVisionProvider::new("minicpm-v").with_base_url("http://localhost:8000/v1/");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");

        let body = provider.build_body(&request(Device::Auto));
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 4);
        assert_eq!(content[0]["image_url"]["url"], "data:image/jpeg;base64,YQ==");
        assert_eq!(content[3]["text"], "What happens?");
        assert_eq!(body["temporal_ids"], json!([[2, 5], [8]]));
        assert_eq!(body["max_tokens"], 2048);
        assert!(body.get("device").is_none());
    }

    #[test]
    fn explicit_device_is_forwarded() {
        let provider = OpenAiVisionProvider::new("minicpm-v");
        let body = provider.build_body(&request(Device::Cuda(1)));
        assert_eq!(body["device"], "cuda:1");
    }
}
