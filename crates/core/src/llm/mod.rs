pub mod anthropic;
pub mod error;
pub mod openai;
pub mod sse;

use crate::config::Settings;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

pub use anthropic::AnthropicNarrativeClient;
pub use openai::OpenAiNarrativeClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
        }
    }

    /// `NARRATIVE_PROVIDER` value; unknown or missing means OpenAI.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("anthropic") | Some("claude") => Provider::Anthropic,
            _ => Provider::OpenAI,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    pub system: String,
    pub user: String,
    /// Overrides the client's configured ceiling.
    pub max_tokens: Option<u32>,
}

/// Text fragments in arrival order. Ends after the provider's end marker; an `Err`
/// item is always the last one.
pub type NarrativeStream = ReceiverStream<anyhow::Result<String>>;

#[async_trait::async_trait]
pub trait NarrativeGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    /// Fails only when the stream cannot be opened (transport error, non-success status).
    async fn open_stream(&self, req: NarrativeRequest) -> anyhow::Result<NarrativeStream>;
}

/// Generator for the configured provider, or `None` when its API key is absent.
pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Arc<dyn NarrativeGenerator>>> {
    let provider = Provider::from_setting(settings.narrative_provider.as_deref());
    let generator: Arc<dyn NarrativeGenerator> = match provider {
        Provider::OpenAI if settings.openai_api_key.is_some() => {
            Arc::new(OpenAiNarrativeClient::from_settings(settings)?)
        }
        Provider::Anthropic if settings.anthropic_api_key.is_some() => {
            Arc::new(AnthropicNarrativeClient::from_settings(settings)?)
        }
        _ => {
            tracing::warn!(
                provider = provider.as_str(),
                "narrative API key missing; recommendations will use fallback text"
            );
            return Ok(None);
        }
    };
    Ok(Some(generator))
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_setting_defaults_to_openai() {
        assert_eq!(Provider::from_setting(None), Provider::OpenAI);
        assert_eq!(Provider::from_setting(Some("gpt")), Provider::OpenAI);
        assert_eq!(Provider::from_setting(Some(" Anthropic ")), Provider::Anthropic);
    }
}
