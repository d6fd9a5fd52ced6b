pub mod mock;
pub mod ollama;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use reelchat_core::VisionChatProvider;

pub use mock::{MockVisionProvider, RecordedRequest};
pub use ollama::OllamaVisionProvider;
pub use openai::OpenAiVisionProvider;

/// Which inference backend answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
    Mock,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "vllm" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider '{other}' (expected openai, ollama or mock)")),
        }
    }
}

/// Everything needed to construct a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Construct the provider described by `settings`.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn VisionChatProvider>> {
    let provider: Arc<dyn VisionChatProvider> = match settings.kind {
        ProviderKind::OpenAi => {
            if settings.model.trim().is_empty() {
                anyhow::bail!("openai provider requires a model name");
            }
            let mut p = OpenAiVisionProvider::new(&settings.model);
            if let Some(url) = &settings.base_url {
                p = p.with_base_url(url);
            }
            if let Some(key) = &settings.api_key {
                p = p.with_api_key(key);
            }
            Arc::new(p)
        }
        ProviderKind::Ollama => {
            if settings.model.trim().is_empty() {
                anyhow::bail!("ollama provider requires a model name");
            }
            let mut p = OllamaVisionProvider::new(&settings.model);
            if let Some(url) = &settings.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::Mock => Arc::new(MockVisionProvider::new("mock")),
    };
    info!(provider = %settings.kind, model = provider.model(), "Registered vision provider");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("vLLM".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!("bedrock".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn builds_each_kind() {
        let openai = build_provider(&ProviderSettings {
            kind: ProviderKind::OpenAi,
            model: "openbmb/MiniCPM-V-4_5".into(),
            base_url: Some("http://localhost:8000/v1".into()),
            api_key: None,
        })
        .unwrap();
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.model(), "openbmb/MiniCPM-V-4_5");

        let mock = build_provider(&ProviderSettings {
            kind: ProviderKind::Mock,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(mock.name(), "mock");
    }

    #[test]
    fn missing_model_is_rejected() {
        let result = build_provider(&ProviderSettings {
            kind: ProviderKind::Ollama,
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
