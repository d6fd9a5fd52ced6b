use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use reelchat_core::{VideoChatRequest, VideoChatResponse, VisionChatProvider};

/// Ollama local vision model provider.
///
/// Ollama has no notion of temporal packs, so only the frames (in order) and
/// the question are sent.
pub struct OllamaVisionProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaVisionProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(&self, request: &VideoChatRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![OllamaChatMessage {
                role: "user".to_string(),
                content: request.question.clone(),
                images: request
                    .images
                    .iter()
                    .map(|image| STANDARD.encode(&image.data))
                    .collect(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: request.generation.temperature,
                top_p: request.generation.top_p,
                num_predict: request.generation.max_new_tokens,
                num_gpu: request.device.is_cpu().then_some(0),
            },
        }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_gpu: Option<u32>,
}

#[derive(Serialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaReply {
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaReply,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

#[async_trait]
impl VisionChatProvider for OllamaVisionProvider {
    fn name(&self) -> &str {
        "ollama"
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
            "Sending request to Ollama (temporal groups not forwarded)"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Ollama HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {}: {}", status, error_body);
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let tokens_used = chat_response.eval_count.unwrap_or(0)
            + chat_response.prompt_eval_count.unwrap_or(0);

        Ok(VideoChatResponse {
            content: chat_response.message.content,
            provider: "ollama".to_string(),
            model: self.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
