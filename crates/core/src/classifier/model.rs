use super::ScreeningClassifier;
use crate::llm::ChatModel;
use crate::screening::{Classification, ScreeningStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Search text beyond this many characters is cut off before prompting.
pub const MAX_SEARCH_TEXT_CHARS: usize = 12_000;

const DEFAULT_ANALYSIS_SUMMARY: &str = "Analysis completed.";
const DEFAULT_SEARCH_SUMMARY: &str = "No search results summary available.";

/// Classifier backed by a chat model.
pub struct ModelClassifier {
    model: Arc<dyn ChatModel>,
}

impl ModelClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn prompt(search_text: &str) -> String {
        format!(
            r#"You are a KYC (Know Your Customer) compliance analyst.
Analyze the following web search results about a person for adverse media, sanctions, PEP (Politically Exposed Person), fraud, criminal activity, or other compliance risks.

Search results:
{search_text}

Respond with a JSON object containing exactly these keys:
1. "analysis_result": one of "OK" (no adverse findings), "NOK" (clear adverse findings), or "AMBIGUOUS" (unclear or investigatory content requiring manual review)
2. "analysis_summary": a 5-10 sentence summary explaining your reasoning
3. "search_results_summary": a 5-10 sentence summary of the key information found in the web search results (main sources, topics, and any notable findings)

Example:
{{"analysis_result": "OK", "analysis_summary": "No adverse findings in search results.", "search_results_summary": "Search returned news articles and public records. No sanctions or adverse media identified. Subject appears in business and professional contexts only."}}
{{"analysis_result": "NOK", "analysis_summary": "Adverse findings: convicted of fraud in 2018.", "search_results_summary": "Multiple sources report conviction for financial fraud. Subject was charged in 2018 and sentenced to..."}}

Your response (JSON only, no markdown):"#
        )
    }

    fn failed(reason: impl std::fmt::Display) -> Classification {
        Classification {
            result: ScreeningStatus::Ambiguous,
            summary: format!("Analysis failed: {}. Manual review required.", reason),
            search_digest: String::new(),
        }
    }
}

/// Returns at most `max_chars` characters of `text`, cut on a character boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Removes a surrounding markdown code fence (```` ``` ```` or ```` ```json ````) if present.
///
/// The opening fence line is always dropped; the last line is dropped only when it is a
/// closing fence.
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed.split('\n').collect();
    let body = match lines.split_last() {
        Some((last, _)) if lines.len() >= 2 && last.trim() == "```" => &lines[1..lines.len() - 1],
        _ => &lines[1..],
    };
    body.join("\n")
}

fn text_field(object: &serde_json::Map<String, Value>, key: &str, default: &str) -> String {
    let text = match object.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}

/// Interprets the model's answer.
///
/// # Errors
///
/// Returns a description of the problem when the answer is not a JSON object.
fn parse_answer(content: &str) -> Result<Classification, String> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(&body).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "model answer is not a JSON object".to_string())?;

    let result = object
        .get("analysis_result")
        .and_then(Value::as_str)
        .and_then(ScreeningStatus::parse_canonical)
        .unwrap_or(ScreeningStatus::Ambiguous);

    Ok(Classification {
        result,
        summary: text_field(object, "analysis_summary", DEFAULT_ANALYSIS_SUMMARY),
        search_digest: text_field(object, "search_results_summary", DEFAULT_SEARCH_SUMMARY),
    })
}

#[async_trait]
impl ScreeningClassifier for ModelClassifier {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn classify(&self, search_text: &str) -> Classification {
        let truncated = truncate_chars(search_text, MAX_SEARCH_TEXT_CHARS);
        tracing::info!(
            input_chars = search_text.chars().count(),
            prompt_chars = truncated.chars().count(),
            "model screening classification"
        );

        let answer = match self.model.complete(None, &Self::prompt(truncated)).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("screening model call failed: {}", e);
                return Self::failed(e);
            }
        };

        match parse_answer(&answer) {
            Ok(classification) => {
                tracing::info!(result = %classification.result, "model screening result");
                classification
            }
            Err(reason) => {
                tracing::error!("could not parse screening model answer: {}", reason);
                Self::failed(reason)
            }
        }
    }
}
