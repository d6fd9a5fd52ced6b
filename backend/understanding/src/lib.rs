//! Vision-language inference for sampled video frames.
//!
//! `providers` wraps the remote or local model endpoints; `service` ties the
//! video encoder to a provider.

pub mod providers;
pub mod service;

pub use providers::{build_provider, MockVisionProvider, OllamaVisionProvider, OpenAiVisionProvider, ProviderKind, ProviderSettings};
pub use service::{BatchAnswer, ChatOptions, VideoChatService};
