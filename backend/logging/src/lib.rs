//! Telemetry and structured logging components for reelchat.
//!
//! Handles log redaction, JSON output generation, file rotation, and chat session event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{ChatEvent, EventLogEntry, EventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
