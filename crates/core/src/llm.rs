//! Chat model access.
//!
//! [`ChatModel`] is the seam between screening logic and whichever model provider is deployed.
//! [`OpenAiChatModel`] talks to an OpenAI-compatible chat-completions endpoint, including the
//! server-sent-events streaming variant. [`MockChatModel`] returns canned text and is used by
//! tests and offline runs.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured for the chat model")]
    MissingApiKey,
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse model response: {0}")]
    ResponseParsing(String),
    #[error("model returned no content")]
    EmptyResponse,
}

/// Stream of text deltas produced by a model.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// A chat model that can answer a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the complete answer to `prompt`.
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, LlmError>;

    /// Returns the answer to `prompt` as it is generated.
    async fn stream(&self, system: Option<&str>, prompt: &str) -> Result<TextStream, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChatChunkChoice>,
}

#[derive(Deserialize)]
struct ChatChunkChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct OpenAiChatModel {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiChatModel {
    /// Create a client for `model` at `base_url` (for example `https://api.openai.com/v1`).
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` for a blank key, or `LlmError::HttpClient` if the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        system: Option<&str>,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
            stream,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, LlmError> {
        let response = self.send(system, prompt, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }

    async fn stream(&self, system: Option<&str>, prompt: &str) -> Result<TextStream, LlmError> {
        let response = self.send(system, prompt, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(delta_stream(bytes))
    }
}

struct DeltaState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl DeltaState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Done => {
                    self.finished = true;
                    break;
                }
                SseEvent::Data(data) => match parse_delta(&data) {
                    Ok(Some(text)) => self.pending.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(e) => self.pending.push_back(Err(e)),
                },
            }
        }
    }
}

/// Turns a raw SSE byte stream from the chat-completions endpoint into text deltas.
fn delta_stream(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(LlmError::HttpClient(e.to_string())), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

fn parse_delta(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: ChatChunk =
        serde_json::from_str(data).map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}

/// A decoded server-sent-events line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` sentinel that ends a chat-completions stream.
    Done,
}

/// Incremental decoder for `data:` lines of a server-sent-events body.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so decoding happens
/// only on complete lines. One space after `data:` is dropped; the rest of the payload is kept
/// as sent.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feeds `chunk` and returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = Self::decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line).into_iter().collect()
    }

    fn decode_line(line: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\n', '\r']);
        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data == "[DONE]" {
            Some(SseEvent::Done)
        } else if data.is_empty() {
            None
        } else {
            Some(SseEvent::Data(data.to_string()))
        }
    }
}

/// Canned chat model for tests and offline runs.
///
/// Records every prompt it receives so tests can inspect what would have been sent.
#[derive(Debug)]
pub struct MockChatModel {
    response: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl MockChatModel {
    /// Answer every prompt with `response`.
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with an HTTP client error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn answer(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.response.clone().map_err(LlmError::HttpClient)
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, _system: Option<&str>, prompt: &str) -> Result<String, LlmError> {
        self.answer(prompt)
    }

    async fn stream(&self, _system: Option<&str>, prompt: &str) -> Result<TextStream, LlmError> {
        let text = self.answer(prompt)?;
        let chunks: Vec<Result<String, LlmError>> = text
            .split_inclusive(' ')
            .map(|part| Ok(part.to_string()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let events = decoder.push(b":1}\r\n\r\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn sse_decoder_ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 3\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn sse_decoder_keeps_payload_whitespace() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data:  there\ndata:tight\n");
        assert_eq!(
            events,
            vec![SseEvent::Data(" there".into()), SseEvent::Data("tight".into())]
        );
    }

    #[test]
    fn sse_decoder_flushes_trailing_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Data("tail".into())]);
    }

    #[test]
    fn parse_delta_skips_role_only_chunks() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(role_only).unwrap(), None);
        let text = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_delta(text).unwrap(), Some("Hel".into()));
    }

    #[tokio::test]
    async fn delta_stream_stops_at_done() {
        let body: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\ndata: [DONE]\n\n"
                .to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n".to_vec()),
        ];
        let deltas: Vec<String> = delta_stream(stream::iter(body).boxed())
            .map(|d| d.unwrap())
            .collect()
            .await;
        assert_eq!(deltas, vec!["Hi".to_string(), " there".to_string()]);
    }

    #[tokio::test]
    async fn mock_stream_reassembles_to_response() {
        let model = MockChatModel::new("one two three");
        let chunks: Vec<String> = model
            .stream(None, "q")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), "one two three");
        assert_eq!(model.prompts(), vec!["q".to_string()]);
    }

    #[test]
    fn openai_model_requires_key() {
        let err = OpenAiChatModel::new("https://example.invalid/v1", "  ", "m").unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
