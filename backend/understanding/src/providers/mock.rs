use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use reelchat_core::{TemporalGroup, VideoChatRequest, VideoChatResponse, VisionChatProvider};

/// What a [`MockVisionProvider`] saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub image_count: usize,
    pub temporal_groups: Vec<TemporalGroup>,
    pub question: String,
}

/// A mock vision provider that returns canned responses and records requests.
pub struct MockVisionProvider {
    name: String,
    fixed_response: Option<String>,
    fail_on: Option<String>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockVisionProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            fail_on: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Fail any request whose question contains `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VisionChatProvider for MockVisionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: &VideoChatRequest) -> Result<VideoChatResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                image_count: request.images.len(),
                temporal_groups: request.temporal_groups.clone(),
                question: request.question.clone(),
            });
        }
        if let Some(needle) = &self.fail_on {
            if request.question.contains(needle.as_str()) {
                anyhow::bail!("mock failure for question containing '{needle}'");
            }
        }
        let content = self.fixed_response.clone().unwrap_or_else(|| {
            format!(
                "Mock answer over {} frames in {} groups",
                request.images.len(),
                request.temporal_groups.len()
            )
        });
        Ok(VideoChatResponse {
            content,
            provider: self.name.clone(),
            model: "mock".to_string(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}
