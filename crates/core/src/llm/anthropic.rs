use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::sse::{self, Frame};
use crate::llm::{env_u64, NarrativeGenerator, NarrativeRequest, NarrativeStream, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct AnthropicNarrativeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    open_timeout: Duration,
}

impl AnthropicNarrativeClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let open_timeout =
            Duration::from_secs(env_u64("ANTHROPIC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
            open_timeout,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(headers)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[async_trait::async_trait]
impl NarrativeGenerator for AnthropicNarrativeClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn open_stream(&self, req: NarrativeRequest) -> anyhow::Result<NarrativeStream> {
        let body = CreateMessageRequest {
            model: &self.model,
            max_tokens: req.max_tokens.unwrap_or(self.max_tokens),
            system: &req.system,
            messages: [Message {
                role: "user",
                content: &req.user,
            }],
            stream: true,
        };

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let send = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&body)
            .send();
        let res = tokio::time::timeout(self.open_timeout, send)
            .await
            .context("Anthropic request timed out")?
            .context("Anthropic request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res
                .text()
                .await
                .context("failed to read Anthropic response body")?;
            return Err(LlmDiagnosticsError::http(Provider::Anthropic, status, text).into());
        }

        tracing::debug!(model = %self.model, "Anthropic narrative stream opened");
        Ok(sse::spawn_relay(res.bytes_stream(), Provider::Anthropic, decode_event))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "error")]
    Error { error: ErrorBody },

    // message_start, content_block_start/stop, message_delta, ping
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub(crate) fn decode_event(data: &str) -> Frame {
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(StreamEvent::ContentBlockDelta {
            delta: Delta::Text { text },
        }) if !text.is_empty() => Frame::Text(text),
        Ok(StreamEvent::MessageStop) => Frame::Done,
        Ok(StreamEvent::Error { error }) => Frame::Error(error.message),
        _ => Frame::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_deltas() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"오늘은 태국"}}"#;
        assert_eq!(decode_event(data), Frame::Text("오늘은 태국".to_string()));
    }

    #[test]
    fn ignores_bookkeeping_events() {
        let start = r#"{"type":"message_start","message":{"id":"msg_1","content":[]}}"#;
        let ping = r#"{"type":"ping"}"#;
        let json_delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert_eq!(decode_event(start), Frame::Skip);
        assert_eq!(decode_event(ping), Frame::Skip);
        assert_eq!(decode_event(json_delta), Frame::Skip);
        assert_eq!(decode_event("not json"), Frame::Skip);
    }

    #[test]
    fn stop_and_error_events() {
        assert_eq!(decode_event(r#"{"type":"message_stop"}"#), Frame::Done);
        let err = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(decode_event(err), Frame::Error("Overloaded".to_string()));
    }
}
