use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{Device, GenerationParams, TemporalGroup};

/// Trait for multimodal chat backends that answer questions about a frame sequence.
#[async_trait]
pub trait VisionChatProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Ask a question about the frames and return the answer text.
    async fn chat(&self, request: &VideoChatRequest) -> Result<VideoChatResponse>;
}

/// One encoded still image ready for transport.
#[derive(Debug, Clone)]
pub struct FrameImage {
    pub mime_type: &'static str,
    pub data: Bytes,
}

/// Request to a vision chat provider.
///
/// `images` and the flattened `temporal_groups` are aligned one to one.
#[derive(Debug, Clone)]
pub struct VideoChatRequest {
    pub images: Vec<FrameImage>,
    pub temporal_groups: Vec<TemporalGroup>,
    pub question: String,
    pub generation: GenerationParams,
    pub device: Device,
}

impl VideoChatRequest {
    pub fn temporal_id_count(&self) -> usize {
        self.temporal_groups.iter().map(Vec::len).sum()
    }
}

/// Response from a vision chat provider.
#[derive(Debug, Clone)]
pub struct VideoChatResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
