use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const ERROR_BODY_MAX_CHARS: usize = 600;

/// The remote translator as seen by the driver: one system instruction plus one user
/// message in, one structured reply out.
pub trait TranslationBackend {
    fn name(&self) -> &str;

    fn complete(&mut self, system: &str, user: &str) -> anyhow::Result<BackendReply>;
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BackendReply {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl BackendReply {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart {
                kind: "text".to_string(),
                text: Some(text.into()),
            }],
            stop_reason: None,
        }
    }

    /// Text of the first content part; empty when there is none.
    #[must_use]
    pub fn first_text(&self) -> &str {
        self.content
            .first()
            .and_then(|p| p.text.as_deref())
            .unwrap_or("")
    }
}

#[derive(Clone, Debug)]
pub struct MessagesClientConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Blocking client for the Messages HTTP API.
pub struct MessagesClient {
    http: reqwest::blocking::Client,
    cfg: MessagesClientConfig,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

#[derive(Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl MessagesClient {
    pub fn new(cfg: MessagesClientConfig) -> anyhow::Result<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(anyhow!("api key is empty"));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.cfg.base_url.trim_end_matches('/'))
    }
}

impl TranslationBackend for MessagesClient {
    fn name(&self) -> &str {
        &self.cfg.model
    }

    fn complete(&mut self, system: &str, user: &str) -> anyhow::Result<BackendReply> {
        let body = MessagesRequest {
            model: &self.cfg.model,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            system,
            messages: [UserMessage {
                role: "user",
                content: [TextBlock { kind: "text", text: user }],
            }],
        };
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.cfg.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .context("send messages request")?;
        let status = resp.status();
        let text = resp.text().context("read messages response")?;
        if !status.is_success() {
            let head: String = text.chars().take(ERROR_BODY_MAX_CHARS).collect();
            return Err(anyhow!("backend returned {status}: {head}"));
        }
        let reply: BackendReply =
            serde_json::from_str(&text).context("decode messages response")?;
        if reply.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(model = %self.cfg.model, "reply hit max_tokens; output is likely truncated");
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendReply, MessagesRequest, TextBlock, UserMessage};

    #[test]
    fn first_text_reads_first_part_only() {
        let reply: BackendReply = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"result\":{}}"},{"type":"text","text":"ignored"}],"stop_reason":"end_turn"}"#,
        )
        .expect("decode");
        assert_eq!(reply.first_text(), r#"{"result":{}}"#);
        assert_eq!(BackendReply::default().first_text(), "");
    }

    #[test]
    fn request_body_shape() {
        let body = MessagesRequest {
            model: "m",
            max_tokens: 8192,
            temperature: 0.0,
            system: "sys",
            messages: [UserMessage {
                role: "user",
                content: [TextBlock {
                    kind: "text",
                    text: "{}",
                }],
            }],
        };
        let v = serde_json::to_value(&body).expect("ser");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"][0]["type"], "text");
        assert_eq!(v["system"], "sys");
        assert_eq!(v["max_tokens"], 8192);
    }
}
