//! Chat Event Logger
//!
//! Structured events (video_encoded, question, answer, error) emitted through
//! tracing so they land in the rolling NDJSON log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    VideoEncoded {
        path: String,
        frames: usize,
        groups: usize,
        packing: usize,
        elapsed_ms: u64,
    },
    Question {
        question: String,
    },
    Answer {
        provider: String,
        model: String,
        content: String,
        latency_ms: u64,
    },
    Error {
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ChatEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Scrub free-text fields and build the entry that gets logged.
    pub fn entry(session_id: &str, mut event: ChatEvent) -> EventLogEntry {
        match &mut event {
            ChatEvent::Question { question } => {
                *question = redact_sensitive_data(question);
            }
            ChatEvent::Answer { content, .. } => {
                *content = redact_sensitive_data(content);
            }
            ChatEvent::Error { error_msg } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
            ChatEvent::VideoEncoded { .. } => {}
        }

        EventLogEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Log a chat session event to the `chat_events` target.
    pub fn log_event(session_id: &str, event: ChatEvent) {
        let entry = Self::entry(session_id, event);
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "chat_events", event = %json, "Chat event"),
            Err(_) => info!(target: "chat_events", event = ?entry, "Chat event"),
        }
    }
}
