//! `/invocations` request and response bodies.
//!
//! Callers send payloads in several shapes depending on the client: direct invocations post
//! `{"prompt": ...}`, SDK invocations wrap the fields as `{"input": {...}}`, and some clients
//! send the whole document as a JSON string. [`InvocationTarget::from_payload`] accepts all of
//! them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Header carrying the runtime session id.
pub const SESSION_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";

/// Error returned when a payload names nothing to screen.
pub const MISSING_INPUT_ERROR: &str = "Missing 'prompt', 'name' or 'caseId' in payload";

/// Fields accepted under `input`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InvocationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(rename = "caseId", default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

/// Invocation payload. Every field is optional; see [`InvocationTarget::from_payload`] for
/// precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InvocationReq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "caseId", default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InvocationInput>,
}

impl InvocationReq {
    pub fn case(case_id: impl Into<String>) -> Self {
        Self {
            case_id: Some(case_id.into()),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }
}

/// Non-streaming `/invocations` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum InvocationRes {
    /// Raw output of the screening run.
    Result { result: String },
    Error { error: String },
}

impl InvocationRes {
    pub fn result(raw: impl Into<String>) -> Self {
        Self::Result { result: raw.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// What an invocation asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationTarget {
    /// Screen a stored case.
    Case(String),
    /// Free text: a person name to screen, or a question in assistant mode.
    Prompt(String),
}

fn text_at<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl InvocationTarget {
    /// Extracts the target from a payload.
    ///
    /// A payload that is a JSON string is decoded first. A case id (`caseId` or `case_id`,
    /// top level or under `input`) wins over text. Text is taken from `input.prompt`, then
    /// `prompt`, then `name`. Values are trimmed and blank values ignored.
    ///
    /// # Returns
    /// `None` when the payload names nothing to act on.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let decoded;
        let payload = match payload {
            Value::String(text) => {
                decoded = serde_json::from_str::<Value>(text).ok()?;
                &decoded
            }
            other => other,
        };
        let object = payload.as_object()?;
        let input = object.get("input").and_then(Value::as_object);

        let case_id = [Some(object), input]
            .into_iter()
            .flatten()
            .find_map(|o| text_at(o, "caseId").or_else(|| text_at(o, "case_id")));
        if let Some(case_id) = case_id {
            return Some(Self::Case(case_id.to_string()));
        }

        input
            .and_then(|i| text_at(i, "prompt"))
            .or_else(|| text_at(object, "prompt"))
            .or_else(|| text_at(object, "name"))
            .map(|text| Self::Prompt(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_and_wrapped_prompts() {
        assert_eq!(
            InvocationTarget::from_payload(&json!({"prompt": "  Jane Roe "})),
            Some(InvocationTarget::Prompt("Jane Roe".into()))
        );
        assert_eq!(
            InvocationTarget::from_payload(&json!({"input": {"prompt": "John Doe"}, "prompt": "x"})),
            Some(InvocationTarget::Prompt("John Doe".into()))
        );
        assert_eq!(
            InvocationTarget::from_payload(&json!({"name": "Jane Roe"})),
            Some(InvocationTarget::Prompt("Jane Roe".into()))
        );
    }

    #[test]
    fn case_id_wins_over_text() {
        assert_eq!(
            InvocationTarget::from_payload(&json!({"prompt": "Jane Roe", "caseId": "C1"})),
            Some(InvocationTarget::Case("C1".into()))
        );
        assert_eq!(
            InvocationTarget::from_payload(&json!({"input": {"case_id": "C2"}})),
            Some(InvocationTarget::Case("C2".into()))
        );
    }

    #[test]
    fn string_payload_is_decoded() {
        let payload = Value::String(r#"{"caseId": "C3"}"#.into());
        assert_eq!(
            InvocationTarget::from_payload(&payload),
            Some(InvocationTarget::Case("C3".into()))
        );
        assert_eq!(InvocationTarget::from_payload(&Value::String("Jane".into())), None);
    }

    #[test]
    fn missing_or_blank_fields() {
        assert_eq!(InvocationTarget::from_payload(&json!({})), None);
        assert_eq!(InvocationTarget::from_payload(&json!({"prompt": "   "})), None);
        assert_eq!(InvocationTarget::from_payload(&json!([1, 2])), None);
        assert_eq!(InvocationTarget::from_payload(&json!({"caseId": 7})), None);
    }

    #[test]
    fn responses_serialize_flat() {
        assert_eq!(
            serde_json::to_value(InvocationRes::result("{}")).unwrap(),
            json!({"result": "{}"})
        );
        assert_eq!(
            serde_json::to_value(InvocationRes::error(MISSING_INPUT_ERROR)).unwrap(),
            json!({"error": "Missing 'prompt', 'name' or 'caseId' in payload"})
        );
    }

    #[test]
    fn request_builders_use_wire_names() {
        assert_eq!(
            serde_json::to_value(InvocationReq::case("C1")).unwrap(),
            json!({"caseId": "C1"})
        );
    }
}
