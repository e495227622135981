use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::sse::{self, Frame};
use crate::llm::{env_u64, NarrativeGenerator, NarrativeRequest, NarrativeStream, Provider};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-5-mini";
const DEFAULT_MAX_TOKENS: u32 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Streaming chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiNarrativeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    open_timeout: Duration,
}

impl OpenAiNarrativeClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let open_timeout = Duration::from_secs(env_u64("OPENAI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));

        // No overall request timeout: it would also cut off a long-running body.
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
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_completion_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[async_trait::async_trait]
impl NarrativeGenerator for OpenAiNarrativeClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn open_stream(&self, req: NarrativeRequest) -> anyhow::Result<NarrativeStream> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &req.system,
                },
                Message {
                    role: "user",
                    content: &req.user,
                },
            ],
            max_completion_tokens: req.max_tokens.unwrap_or(self.max_tokens),
            stream: true,
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let send = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let res = tokio::time::timeout(self.open_timeout, send)
            .await
            .context("OpenAI request timed out")?
            .context("OpenAI request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmDiagnosticsError::http(Provider::OpenAI, status, text).into());
        }

        tracing::debug!(model = %self.model, "OpenAI narrative stream opened");
        Ok(sse::spawn_relay(res.bytes_stream(), Provider::OpenAI, decode_chunk))
    }
}

/// One `data:` payload of a chat-completions stream.
pub(crate) fn decode_chunk(data: &str) -> Frame {
    let data = data.trim();
    if data == "[DONE]" {
        return Frame::Done;
    }
    let Ok(json) = serde_json::from_str::<Value>(data) else {
        return Frame::Skip;
    };
    if let Some(err) = json.get("error") {
        let detail = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Frame::Error(detail.to_string());
    }

    let Some(choice) = json.pointer("/choices/0") else {
        return Frame::Skip;
    };
    let content = choice
        .pointer("/delta/content")
        .or_else(|| choice.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if content.is_empty() {
        Frame::Skip
    } else {
        Frame::Text(content.to_string())
    }
}
