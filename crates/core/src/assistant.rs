//! Streaming compliance assistant.
//!
//! Answers free-form prompts with the chat model and yields the answer as it is generated. The
//! runtime uses it for its streaming response variant.

use crate::llm::{ChatModel, LlmError, TextStream};
use futures_util::StreamExt;
use std::sync::Arc;

/// System prompt used for every assistant turn.
pub const ASSISTANT_SYSTEM_PROMPT: &str = "You're a helpful KYC compliance assistant. \
    You answer questions about customer due diligence, sanctions and adverse-media screening \
    clearly and concisely. If you are not sure about a fact, say so.";

#[derive(Clone)]
pub struct Assistant {
    model: Arc<dyn ChatModel>,
}

impl Assistant {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Streams the answer to `prompt` as text chunks. Empty chunks are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] if the model call cannot be started. Errors raised mid-stream are
    /// yielded as stream items.
    pub async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        tracing::info!(prompt_chars = prompt.chars().count(), "assistant turn");
        let stream = self
            .model
            .stream(Some(ASSISTANT_SYSTEM_PROMPT), prompt)
            .await?;
        Ok(stream
            .filter(|chunk| {
                let keep = !matches!(chunk, Ok(text) if text.is_empty());
                async move { keep }
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn stream_yields_model_chunks() {
        let assistant = Assistant::new(Arc::new(MockChatModel::new("Screening looks clean.")));
        let chunks: Vec<String> = assistant
            .stream("Is Jane Roe sanctioned?")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), "Screening looks clean.");
    }

    #[tokio::test]
    async fn stream_passes_prompt_through() {
        let model = Arc::new(MockChatModel::new("ok"));
        let assistant = Assistant::new(model.clone());
        let _ = assistant.stream("What is a PEP?").await.unwrap();
        assert_eq!(model.prompts(), vec!["What is a PEP?".to_string()]);
    }

    #[tokio::test]
    async fn failing_model_is_an_error() {
        let assistant = Assistant::new(Arc::new(MockChatModel::failing("down")));
        assert!(assistant.stream("hello").await.is_err());
    }
}
