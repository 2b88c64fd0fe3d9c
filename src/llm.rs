//! OpenRouter completion client
//!
//! One provider, two call shapes: a streaming request whose deltas arrive on
//! an mpsc channel, and a one-shot request that returns the full reply. All
//! HTTP classification happens here; callers only ever see [`ChatError`].

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ChatError, Result};

/// Attribution headers sent with every request, identifying the app to the
/// provider. Not behaviorally significant.
const APP_REFERER: &str = "https://github.com/confab-chat/confab";
const APP_TITLE: &str = "Confab";

/// Events emitted while a completion streams
#[derive(Debug)]
pub enum LlmEvent {
    /// Text delta from the streaming response
    TextDelta(String),
    /// Stream closed normally
    StreamComplete,
    /// Terminal failure; no further events follow
    Error(ChatError),
}

/// Role-tagged message in the wire format the provider expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request to send to the provider
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Client for the OpenRouter chat-completions endpoint
#[derive(Clone)]
pub struct LlmClient {
    config: Config,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: Config) -> Self {
        // The deadline doubles as the stall guard: a provider stream that
        // stops producing terminates the exchange instead of hanging forever.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Start a streaming completion. Returns immediately with the receiving
    /// end of the event channel; the request itself runs on a spawned task.
    ///
    /// A missing API key short-circuits before any network activity: the
    /// channel carries a single [`LlmEvent::Error`] and nothing is sent.
    pub async fn stream_response(&self, request: LlmRequest) -> Result<mpsc::Receiver<LlmEvent>> {
        let (tx, rx) = mpsc::channel(1000);

        if !self.config.has_api_key() {
            let _ = tx.send(LlmEvent::Error(ChatError::ApiKeyMissing)).await;
            return Ok(rx);
        }
        let api_key = self.config.api_key.clone().ok_or(ChatError::ApiKeyMissing)?;

        let client = self.client.clone();
        let url = format!("{}/chat/completions", self.config.base_url);
        let payload = self.build_payload(&request, true);

        debug!(messages = request.messages.len(), "starting streaming completion");
        let tx_err = tx.clone();
        tokio::spawn(async move {
            if let Err(err) = stream_completion(client, url, api_key, payload, tx).await {
                let _ = tx_err.send(LlmEvent::Error(err)).await;
            }
        });

        Ok(rx)
    }

    /// Non-streaming fallback: one request, one reply string.
    pub async fn send_chat_message(&self, request: LlmRequest) -> Result<String> {
        if !self.config.has_api_key() {
            return Err(ChatError::ApiKeyMissing);
        }
        let api_key = self.config.api_key.clone().ok_or(ChatError::ApiKeyMissing)?;

        let url = format!("{}/chat/completions", self.config.base_url);
        let payload = self.build_payload(&request, false);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "completion request rejected: {}", body);
            return Err(ChatError::from_status(status));
        }

        let body: serde_json::Value = response.json().await?;
        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| ChatError::UnexpectedResponse(body.to_string()))?;

        Ok(content.trim().to_string())
    }

    fn build_payload(&self, request: &LlmRequest, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": request.messages,
            "stream": stream,
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
        })
    }
}

/// Issue the streaming request and pump Server-Sent Events into the channel.
async fn stream_completion(
    client: reqwest::Client,
    url: String,
    api_key: String,
    payload: serde_json::Value,
    tx: mpsc::Sender<LlmEvent>,
) -> Result<()> {
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .header("HTTP-Referer", APP_REFERER)
        .header("X-Title", APP_TITLE)
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "streaming request rejected: {}", body);
        return Err(ChatError::from_status(status));
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // Process complete lines
        while let Some(newline_pos) = buffer.find('\n') {
            let line = buffer[..newline_pos].trim().to_string();
            buffer = buffer[newline_pos + 1..].to_string();

            match parse_sse_line(&line) {
                Some(SseChunk::Delta(text)) => {
                    let _ = tx.send(LlmEvent::TextDelta(text)).await;
                }
                Some(SseChunk::Done) => {
                    let _ = tx.send(LlmEvent::StreamComplete).await;
                    return Ok(());
                }
                None => {}
            }
        }
    }

    // Flush any remaining buffer line (without newline)
    if let Some(SseChunk::Delta(text)) = parse_sse_line(buffer.trim()) {
        let _ = tx.send(LlmEvent::TextDelta(text)).await;
    }

    let _ = tx.send(LlmEvent::StreamComplete).await;
    Ok(())
}

/// One parsed Server-Sent Events line
#[derive(Debug, PartialEq)]
enum SseChunk {
    Delta(String),
    Done,
}

fn parse_sse_line(line: &str) -> Option<SseChunk> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return Some(SseChunk::Done);
    }

    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let content = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())?;
    Some(SseChunk::Delta(content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_delta_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(SseChunk::Delta("Hi".into())));
    }

    #[test]
    fn test_parse_sse_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseChunk::Done));
    }

    #[test]
    fn test_parse_sse_ignores_non_data_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
    }

    #[test]
    fn test_parse_sse_ignores_deltas_without_content() {
        // role-only delta at stream start
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line), None);
        // finish chunk with empty delta
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), None);
    }
}
