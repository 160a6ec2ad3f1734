//! HTTP-backed responders and the provider factory.
//!
//! Providers are selected by `[responder].provider`:
//!
//! | Provider | Backend |
//! |----------|---------|
//! | `disabled` | Always fails (default) |
//! | `echo` | Offline [`EchoResponder`] |
//! | `openai` | `POST {openai_base_url}/chat/completions` |
//! | `anthropic` | `POST {anthropic_base_url}/v1/messages` |
//! | `auto` | `claude*` models → Anthropic, everything else → OpenAI |
//!
//! Both HTTP backends retry rate limits (429), server errors (5xx), and
//! network failures with exponential backoff (1s, 2s, 4s, … capped at 32s).
//! Other client errors fail immediately. Every attempt races the run's
//! [`CancelToken`].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rag_relay_core::{CancelToken, EchoResponder, Responder, ResponderReply, ResponderRequest};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ResponderConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Reasoning text reported for `o1*` models, whose chain of thought is
/// never returned by the API.
pub const O1_REASONING_NOTE: &str =
    "This model reasons internally before answering; its reasoning steps are not returned.";

/// Appended to the reasoning text for each `redacted_thinking` block.
pub const REDACTED_THINKING_MARKER: &str = "\n[Part of the reasoning was redacted by the provider]";

const CANCEL_POLL: Duration = Duration::from_millis(100);

// ============ Disabled ============

pub struct DisabledResponder;

#[async_trait]
impl Responder for DisabledResponder {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn respond(&self, _: &ResponderRequest, _: &CancelToken) -> Result<ResponderReply> {
        bail!("Responder is disabled. Set [responder].provider in the config file.")
    }
}

// ============ OpenAI ============

pub struct OpenAiResponder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ResponderConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: format!(
                "{}/chat/completions",
                config.openai_base_url.trim_end_matches('/')
            ),
            api_key,
            max_retries: config.max_retries,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn body(&self, request: &ResponderRequest) -> Value {
        if is_o1_model(&request.model_name) {
            // o1 models reject the system role and `max_tokens`.
            let content = if request.system_prompt.is_empty() {
                request.prompt.clone()
            } else {
                format!("{}\n\n{}", request.system_prompt, request.prompt)
            };
            json!({
                "model": request.model_name,
                "messages": [{ "role": "user", "content": content }],
                "max_completion_tokens": self.max_tokens,
            })
        } else {
            let mut messages = Vec::with_capacity(2);
            if !request.system_prompt.is_empty() {
                messages.push(json!({ "role": "system", "content": request.system_prompt }));
            }
            messages.push(json!({ "role": "user", "content": request.prompt }));
            json!({
                "model": request.model_name,
                "messages": messages,
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
            })
        }
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn respond(
        &self,
        request: &ResponderRequest,
        cancel: &CancelToken,
    ) -> Result<ResponderReply> {
        let body = self.body(request);
        let json = post_with_retry(
            &self.client,
            &self.endpoint,
            &[("Authorization", format!("Bearer {}", self.api_key))],
            &body,
            self.max_retries,
            "OpenAI",
            cancel,
        )
        .await?;
        parse_openai_response(&json, is_o1_model(&request.model_name))
    }
}

fn is_o1_model(model_name: &str) -> bool {
    model_name.starts_with("o1")
}

fn parse_openai_response(json: &Value, o1: bool) -> Result<ResponderReply> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))?;

    let (reasoning, has_reasoning) = if o1 {
        (O1_REASONING_NOTE.to_string(), true)
    } else {
        (String::new(), false)
    };

    Ok(ResponderReply {
        content: content.to_string(),
        reasoning,
        has_reasoning,
    })
}

// ============ Anthropic ============

pub struct AnthropicResponder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f32,
    thinking_budget: u32,
    reasoning_models: Vec<String>,
}

impl AnthropicResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ResponderConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: format!(
                "{}/v1/messages",
                config.anthropic_base_url.trim_end_matches('/')
            ),
            api_key,
            max_retries: config.max_retries,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            thinking_budget: config.thinking_budget,
            reasoning_models: config.reasoning_models.clone(),
        })
    }

    fn thinking_enabled(&self, request: &ResponderRequest) -> bool {
        request.enable_reasoning && self.reasoning_models.iter().any(|m| *m == request.model_name)
    }

    fn body(&self, request: &ResponderRequest) -> Value {
        let mut body = json!({
            "model": request.model_name,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }
        if self.thinking_enabled(request) {
            body["thinking"] = json!({ "type": "enabled", "budget_tokens": self.thinking_budget });
        } else {
            body["temperature"] = json!(self.temperature);
        }
        body
    }
}

#[async_trait]
impl Responder for AnthropicResponder {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn respond(
        &self,
        request: &ResponderRequest,
        cancel: &CancelToken,
    ) -> Result<ResponderReply> {
        let body = self.body(request);
        let json = post_with_retry(
            &self.client,
            &self.endpoint,
            &[
                ("x-api-key", self.api_key.clone()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            &body,
            self.max_retries,
            "Anthropic",
            cancel,
        )
        .await?;
        parse_anthropic_response(&json, self.thinking_enabled(request))
    }
}

fn parse_anthropic_response(json: &Value, thinking: bool) -> Result<ResponderReply> {
    let blocks = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid Anthropic response: missing content array"))?;

    let mut content = String::new();
    let mut reasoning = String::new();

    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    content.push_str(text);
                }
            }
            Some("thinking") => {
                if let Some(text) = block.get("thinking").and_then(Value::as_str) {
                    reasoning.push_str(text);
                }
            }
            Some("redacted_thinking") => reasoning.push_str(REDACTED_THINKING_MARKER),
            _ => {}
        }
    }

    Ok(ResponderReply {
        content,
        reasoning,
        has_reasoning: thinking,
    })
}

// ============ Auto ============

/// Routes by model family. Either backend may be missing when its API key
/// is not set; requests for that family then fail.
pub struct AutoResponder {
    openai: Option<OpenAiResponder>,
    anthropic: Option<AnthropicResponder>,
}

impl AutoResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self> {
        let openai = OpenAiResponder::new(config).ok();
        let anthropic = AnthropicResponder::new(config).ok();
        if openai.is_none() && anthropic.is_none() {
            bail!("auto responder needs OPENAI_API_KEY or ANTHROPIC_API_KEY");
        }
        Ok(Self { openai, anthropic })
    }
}

#[async_trait]
impl Responder for AutoResponder {
    fn name(&self) -> &str {
        "auto"
    }

    async fn respond(
        &self,
        request: &ResponderRequest,
        cancel: &CancelToken,
    ) -> Result<ResponderReply> {
        if request.model_name.starts_with("claude") {
            match &self.anthropic {
                Some(r) => r.respond(request, cancel).await,
                None => bail!("ANTHROPIC_API_KEY not set (model {})", request.model_name),
            }
        } else {
            match &self.openai {
                Some(r) => r.respond(request, cancel).await,
                None => bail!("OPENAI_API_KEY not set (model {})", request.model_name),
            }
        }
    }
}

// ============ Shared ============

fn build_client(config: &ResponderConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

async fn cancelled(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}

async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &Value,
    max_retries: u32,
    provider: &str,
    cancel: &CancelToken,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(provider, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(cancel) => bail!("request cancelled"),
            }
        }
        if cancel.is_cancelled() {
            bail!("request cancelled");
        }

        let mut builder = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        let resp = tokio::select! {
            r = builder.send() => r,
            _ = cancelled(cancel) => bail!("request cancelled"),
        };

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    debug!(provider, attempt, "request succeeded");
                    return response
                        .json::<Value>()
                        .await
                        .with_context(|| format!("{} returned a non-JSON body", provider));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", provider, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", provider, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::Error::new(e).context(format!("{} request failed", provider)));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", provider)))
}

/// Build the responder selected by `[responder].provider`.
pub fn create_responder(config: &ResponderConfig) -> Result<Box<dyn Responder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledResponder)),
        "echo" => Ok(Box::new(EchoResponder::new())),
        "openai" => Ok(Box::new(OpenAiResponder::new(config)?)),
        "anthropic" => Ok(Box::new(AnthropicResponder::new(config)?)),
        "auto" => Ok(Box::new(AutoResponder::new(config)?)),
        other => bail!("Unknown responder provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request(model: &str, reasoning: bool) -> ResponderRequest {
        ResponderRequest {
            prompt: "What changed?".into(),
            model_name: model.into(),
            system_prompt: "Be brief.".into(),
            enable_reasoning: reasoning,
        }
    }

    fn config_with_base(base: &str) -> ResponderConfig {
        ResponderConfig {
            openai_base_url: base.to_string(),
            anthropic_base_url: base.to_string(),
            max_retries: 1,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn openai_body_for_chat_models() {
        let r = OpenAiResponder::with_api_key(&ResponderConfig::default(), "k".into()).unwrap();
        let body = r.body(&request("gpt-4o", false));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "What changed?");
        assert_eq!(body["max_tokens"], 8192);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(r.endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn openai_body_for_o1_folds_system_prompt() {
        let r = OpenAiResponder::with_api_key(&ResponderConfig::default(), "k".into()).unwrap();
        let body = r.body(&request("o1-preview", false));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "Be brief.\n\nWhat changed?");
        assert_eq!(body["max_completion_tokens"], 8192);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn openai_reply_parsing() {
        let json = json!({ "choices": [{ "message": { "content": "Done." } }] });
        let reply = parse_openai_response(&json, false).unwrap();
        assert_eq!(reply.content, "Done.");
        assert!(!reply.has_reasoning);

        let reply = parse_openai_response(&json, true).unwrap();
        assert!(reply.has_reasoning);
        assert_eq!(reply.reasoning, O1_REASONING_NOTE);

        assert!(parse_openai_response(&json!({ "choices": [] }), false).is_err());
    }

    #[test]
    fn anthropic_thinking_only_for_listed_models() {
        let r = AnthropicResponder::with_api_key(&ResponderConfig::default(), "k".into()).unwrap();

        let body = r.body(&request("claude-3-7-sonnet-latest", true));
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 4000);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["system"], "Be brief.");

        let body = r.body(&request("claude-3-haiku", true));
        assert!(body.get("thinking").is_none());

        let body = r.body(&request("claude-3-7-sonnet-latest", false));
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn anthropic_reply_collects_blocks() {
        let json = json!({ "content": [
            { "type": "thinking", "thinking": "Let me see." },
            { "type": "redacted_thinking", "data": "xxx" },
            { "type": "text", "text": "Answer." }
        ]});
        let reply = parse_anthropic_response(&json, true).unwrap();
        assert_eq!(reply.content, "Answer.");
        assert_eq!(
            reply.reasoning,
            format!("Let me see.{}", REDACTED_THINKING_MARKER)
        );
        assert!(reply.has_reasoning);

        assert!(parse_anthropic_response(&json!({}), false).is_err());
    }

    #[tokio::test]
    async fn disabled_always_fails() {
        let err = DisabledResponder
            .respond(&request("gpt-4", false), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn factory_builds_offline_providers() {
        let mut cfg = ResponderConfig::default();
        assert_eq!(create_responder(&cfg).unwrap().name(), "disabled");
        cfg.provider = "echo".into();
        assert_eq!(create_responder(&cfg).unwrap().name(), "echo");
        cfg.provider = "palm".into();
        assert!(create_responder(&cfg).is_err());
    }

    /// Serve canned HTTP responses, one per connection, in order.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn openai_retries_server_errors() {
        let base = serve(vec![
            (500, r#"{"error":"boom"}"#),
            (200, r#"{"choices":[{"message":{"content":"recovered"}}]}"#),
        ])
        .await;
        let r = OpenAiResponder::with_api_key(&config_with_base(&base), "k".into()).unwrap();
        let reply = r
            .respond(&request("gpt-4o", false), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(reply.content, "recovered");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let base = serve(vec![(401, r#"{"error":"bad key"}"#)]).await;
        let r = AnthropicResponder::with_api_key(&config_with_base(&base), "k".into()).unwrap();
        let err = r
            .respond(&request("claude-3-haiku", false), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let r = OpenAiResponder::with_api_key(&config_with_base("http://127.0.0.1:9"), "k".into())
            .unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = r.respond(&request("gpt-4o", false), &token).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
