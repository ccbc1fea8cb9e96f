//! Screening tools.
//!
//! Each tool takes plain strings and returns a plain string. Failures are returned as
//! `Error: ...` text (or a `{"error": ...}` document for the analysis tool) and logged, so a
//! tool call never aborts the pipeline on its own. The case and search tools also have a typed
//! form returning [`ToolError`], which is what the crew branches on.

use crate::classifier::ScreeningClassifier;
use crate::constants::UNKNOWN;
use crate::screening::ScreeningOutcome;
use crate::search::SearchProvider;
use crate::store::CaseStore;
use kyc_types::CaseId;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// A failed tool call. `Display` gives the `Error...` line the tool returns as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// A required argument was blank.
    #[error("Error: {0} is required.")]
    MissingArgument(&'static str),
    #[error("Error: No case found for caseId {0}.")]
    CaseNotFound(String),
    #[error("Error fetching case: {0}")]
    FetchCase(String),
    #[error("Error performing search: {0}")]
    Search(String),
}

fn error_document(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

// ============================================================================
// CASE DETAILS
// ============================================================================

/// Fetches a case and returns the fields screening needs.
#[derive(Clone)]
pub struct GetCaseDetailsTool {
    cases: Arc<dyn CaseStore>,
}

impl GetCaseDetailsTool {
    pub const NAME: &'static str = "get_case_details";

    pub fn new(cases: Arc<dyn CaseStore>) -> Self {
        Self { cases }
    }

    /// Looks up `case_id`.
    ///
    /// # Returns
    ///
    /// Pretty JSON with `case_id`, `caseId`, `identity` (`fullName`, `dateOfBirth`,
    /// `nationality`) and `status`, or an `Error: ...` line.
    pub async fn run(&self, case_id: &str) -> String {
        self.fetch(case_id).await.unwrap_or_else(|e| e.to_string())
    }

    /// Typed form of [`GetCaseDetailsTool::run`].
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] for a blank id, an unknown case or a store failure.
    pub async fn fetch(&self, case_id: &str) -> Result<String, ToolError> {
        tracing::info!(case_id, "{} input", Self::NAME);
        let id = CaseId::parse(case_id).map_err(|_| ToolError::MissingArgument("case_id"))?;

        let item = match self.cases.get_case(id.as_str()).await {
            Ok(Some(item)) => item,
            Ok(None) => return Err(ToolError::CaseNotFound(id.to_string())),
            Err(e) => {
                tracing::error!("{} failed: {}", Self::NAME, e);
                return Err(ToolError::FetchCase(e.to_string()));
            }
        };

        let details = Self::summarize(&item, &id);
        let out = serde_json::to_string_pretty(&details)
            .map_err(|e| ToolError::FetchCase(e.to_string()))?;
        tracing::info!("{} output: returned case for case_id={}", Self::NAME, id);
        Ok(out)
    }

    fn summarize(item: &Value, requested: &CaseId) -> Value {
        let empty = Map::new();
        let record = item.as_object().unwrap_or(&empty);
        let identity = record.get("identity").and_then(Value::as_object);

        let case_id = non_empty_str(record, "caseId")
            .or_else(|| non_empty_str(record, "CaseId"))
            .unwrap_or(requested.as_str());
        let identity_field = |key: &str| identity.and_then(|i| i.get(key)).cloned().unwrap_or(Value::Null);
        let full_name = identity
            .and_then(|i| i.get("fullName"))
            .cloned()
            .unwrap_or_else(|| Value::String(UNKNOWN.to_string()));

        json!({
            "case_id": case_id,
            "caseId": case_id,
            "identity": {
                "fullName": full_name,
                "dateOfBirth": identity_field("dateOfBirth"),
                "nationality": identity_field("nationality"),
            },
            "status": record.get("status").cloned().unwrap_or(Value::Null),
        })
    }
}

// ============================================================================
// PERSON SEARCH
// ============================================================================

/// Searches the web for adverse media about a person.
#[derive(Clone)]
pub struct SearchPersonTool {
    search: Arc<dyn SearchProvider>,
}

impl SearchPersonTool {
    pub const NAME: &'static str = "search_person";

    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }

    /// Query sent to the search provider for `person_name`.
    pub fn query_for(person_name: &str) -> String {
        format!("{} news sanctions adverse media PEP", person_name)
    }

    /// Searches for `person_name`.
    ///
    /// When `case_id` is given the result is wrapped as `{"case_id", "search_results"}` so the
    /// id travels with the text. Failures come back as an `Error...` line.
    pub async fn run(&self, person_name: &str, case_id: Option<&str>) -> String {
        self.search(person_name, case_id)
            .await
            .unwrap_or_else(|e| e.to_string())
    }

    /// Typed form of [`SearchPersonTool::run`].
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MissingArgument`] for a blank name and [`ToolError::Search`] when
    /// the provider fails.
    pub async fn search(&self, person_name: &str, case_id: Option<&str>) -> Result<String, ToolError> {
        tracing::info!(person_name, case_id, "{} input", Self::NAME);
        if person_name.trim().is_empty() {
            return Err(ToolError::MissingArgument("person_name"));
        }

        let text = self
            .search
            .search(&Self::query_for(person_name))
            .await
            .map_err(|e| {
                tracing::error!("{} failed: {}", Self::NAME, e);
                ToolError::Search(e.to_string())
            })?;
        tracing::info!("{} output: returned {} chars", Self::NAME, text.len());

        Ok(match case_id.filter(|id| !id.is_empty()) {
            Some(id) => json!({ "case_id": id, "search_results": text }).to_string(),
            None => text,
        })
    }
}

// ============================================================================
// SCREENING ANALYSIS
// ============================================================================

/// Combines case details and search text into a screening outcome.
#[derive(Clone)]
pub struct ScreeningAnalysisTool {
    classifier: Arc<dyn ScreeningClassifier>,
}

/// Search text with the case id it may have carried.
struct SearchPayload {
    text: String,
    case_id: Option<String>,
}

impl SearchPayload {
    /// Unwraps `{"case_id", "search_results"}` documents; any other text is taken as-is.
    fn from_tool_output(search_results: &str) -> Self {
        let raw = || Self {
            text: search_results.to_string(),
            case_id: None,
        };
        if !search_results.trim_start().starts_with('{') {
            return raw();
        }

        let parsed: Value = match serde_json::from_str(search_results) {
            Ok(value) => value,
            Err(_) => return raw(),
        };
        let Some(object) = parsed.as_object() else {
            return raw();
        };

        let text = match object.get("search_results") {
            None => search_results.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };
        Self {
            text,
            case_id: non_empty_str(object, "case_id").map(str::to_string),
        }
    }
}

impl ScreeningAnalysisTool {
    pub const NAME: &'static str = "produce_screening_analysis";

    pub fn new(classifier: Arc<dyn ScreeningClassifier>) -> Self {
        Self { classifier }
    }

    /// Classifies `search_results` for the case described by `case_details`.
    ///
    /// # Returns
    ///
    /// Pretty [`ScreeningOutcome`] JSON, or `{"error": ...}` when an input is missing or
    /// `case_details` is not JSON.
    pub async fn run(&self, case_details: &str, search_results: &str) -> String {
        tracing::info!(
            case_details_len = case_details.len(),
            search_results_len = search_results.len(),
            "{} input",
            Self::NAME
        );
        if case_details.is_empty() {
            return error_document("case_details is required");
        }
        if search_results.is_empty() {
            return error_document("search_results is required");
        }

        let case: Value = match serde_json::from_str(case_details) {
            Ok(case) => case,
            Err(_) => return error_document("Invalid case_details JSON"),
        };
        let search = SearchPayload::from_tool_output(search_results);

        let (case_id, name) = match case.as_object() {
            Some(record) => {
                let case_id = search
                    .case_id
                    .as_deref()
                    .or_else(|| non_empty_str(record, "caseId"))
                    .or_else(|| non_empty_str(record, "case_id"))
                    .unwrap_or(UNKNOWN);
                let name = record
                    .get("identity")
                    .and_then(Value::as_object)
                    .and_then(|identity| identity.get("fullName"))
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN);
                (case_id.to_string(), name.to_string())
            }
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        };

        let classification = self.classifier.classify(&search.text).await;
        let outcome = ScreeningOutcome::from_classification(case_id, name, classification);
        tracing::info!(
            "{} output: analysis_result={}",
            Self::NAME,
            outcome.analysis_result
        );

        serde_json::to_string_pretty(&outcome)
            .unwrap_or_else(|e| error_document(&format!("failed to encode outcome: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;
    use crate::search::StaticSearch;
    use crate::store::InMemoryCaseStore;

    fn case_tool() -> GetCaseDetailsTool {
        let cases = InMemoryCaseStore::new().with_case(
            "C1",
            json!({
                "CaseId": "C1",
                "status": "OPEN",
                "identity": {"fullName": "Jane Roe", "nationality": "NL"},
                "files": ["passport.pdf"],
            }),
        );
        GetCaseDetailsTool::new(Arc::new(cases))
    }

    fn analysis_tool() -> ScreeningAnalysisTool {
        ScreeningAnalysisTool::new(Arc::new(KeywordClassifier::new()))
    }

    #[tokio::test]
    async fn case_details_returns_screening_fields() {
        let out = case_tool().run("C1").await;
        let details: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(details["case_id"], "C1");
        assert_eq!(details["caseId"], "C1");
        assert_eq!(details["identity"]["fullName"], "Jane Roe");
        assert_eq!(details["identity"]["nationality"], "NL");
        assert!(details["identity"]["dateOfBirth"].is_null());
        assert_eq!(details["status"], "OPEN");
        assert!(details.get("files").is_none());
    }

    #[tokio::test]
    async fn case_details_error_strings() {
        let tool = case_tool();
        assert_eq!(tool.run("").await, "Error: case_id is required.");
        assert_eq!(tool.run("C9").await, "Error: No case found for caseId C9.");
        assert_eq!(tool.run("   ").await, "Error: case_id is required.");
    }

    #[tokio::test]
    async fn case_details_accepts_ids_with_separators() {
        let cases = InMemoryCaseStore::new().with_case(
            "ACME/2024/17",
            json!({"CaseId": "ACME/2024/17", "identity": {"fullName": "Jane Roe"}}),
        );
        let tool = GetCaseDetailsTool::new(Arc::new(cases));
        let details: Value = serde_json::from_str(&tool.fetch("ACME/2024/17").await.unwrap()).unwrap();
        assert_eq!(details["caseId"], "ACME/2024/17");
        assert_eq!(
            tool.fetch("ACME/2024/18").await.unwrap_err(),
            ToolError::CaseNotFound("ACME/2024/18".into())
        );
    }

    #[tokio::test]
    async fn case_without_identity_is_unknown() {
        let cases = InMemoryCaseStore::new().with_case("C2", json!({"CaseId": "C2"}));
        let out = GetCaseDetailsTool::new(Arc::new(cases)).run("C2").await;
        let details: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(details["identity"]["fullName"], "Unknown");
        assert!(details["status"].is_null());
    }

    #[tokio::test]
    async fn search_wraps_case_id() {
        let tool = SearchPersonTool::new(Arc::new(StaticSearch::new("Jane Roe is an architect.")));

        let plain = tool.run("Jane Roe", None).await;
        assert_eq!(plain, "Jane Roe is an architect.");

        let wrapped: Value = serde_json::from_str(&tool.run("Jane Roe", Some("C1")).await).unwrap();
        assert_eq!(wrapped["case_id"], "C1");
        assert_eq!(wrapped["search_results"], "Jane Roe is an architect.");
    }

    #[tokio::test]
    async fn search_error_strings() {
        let tool = SearchPersonTool::new(Arc::new(StaticSearch::failing("quota exceeded")));
        assert_eq!(tool.run("  ", None).await, "Error: person_name is required.");
        let out = tool.run("Jane Roe", None).await;
        assert!(out.starts_with("Error performing search: "));
        assert!(out.contains("quota exceeded"));
    }

    #[test]
    fn search_query_mentions_screening_terms() {
        assert_eq!(
            SearchPersonTool::query_for("Jane Roe"),
            "Jane Roe news sanctions adverse media PEP"
        );
    }

    #[tokio::test]
    async fn analysis_validates_inputs() {
        let tool = analysis_tool();
        let missing_case: Value = serde_json::from_str(&tool.run("", "text").await).unwrap();
        assert_eq!(missing_case["error"], "case_details is required");

        let missing_search: Value = serde_json::from_str(&tool.run("{}", "").await).unwrap();
        assert_eq!(missing_search["error"], "search_results is required");

        let invalid: Value = serde_json::from_str(&tool.run("not json", "text").await).unwrap();
        assert_eq!(invalid["error"], "Invalid case_details JSON");
    }

    #[tokio::test]
    async fn analysis_uses_propagated_case_id() {
        let case = r#"{"caseId": "C1", "identity": {"fullName": "Jane Roe"}}"#;
        let search = json!({"case_id": "C7", "search_results": "Convicted of fraud."}).to_string();

        let outcome: ScreeningOutcome =
            serde_json::from_str(&analysis_tool().run(case, &search).await).unwrap();
        assert_eq!(outcome.case_id, "C7");
        assert_eq!(outcome.name, "Jane Roe");
        assert_eq!(outcome.analysis_result, "NOK");
        assert!(!outcome.analysis_summary.is_empty());
    }

    #[tokio::test]
    async fn analysis_defaults_to_unknown() {
        let outcome: ScreeningOutcome =
            serde_json::from_str(&analysis_tool().run("[1, 2]", "A quiet life.").await).unwrap();
        assert_eq!(outcome.case_id, "Unknown");
        assert_eq!(outcome.name, "Unknown");
        assert_eq!(outcome.analysis_result, "OK");
    }

    #[tokio::test]
    async fn analysis_accepts_brace_text_that_is_not_json() {
        let case = r#"{"case_id": "C3", "identity": {"fullName": "John Doe"}}"#;
        let outcome: ScreeningOutcome = serde_json::from_str(
            &analysis_tool()
                .run(case, "{ an alleged scheme, unclear }")
                .await,
        )
        .unwrap();
        assert_eq!(outcome.case_id, "C3");
        assert_eq!(outcome.analysis_result, "AMBIGUOUS");
    }

    #[tokio::test]
    async fn search_text_starting_with_error_is_a_result() {
        let tool = SearchPersonTool::new(Arc::new(StaticSearch::new("Error rates fell at her firm.")));
        assert_eq!(
            tool.search("Jane Roe", None).await,
            Ok("Error rates fell at her firm.".to_string())
        );
        assert!(matches!(
            SearchPersonTool::new(Arc::new(StaticSearch::failing("down")))
                .search("Jane Roe", None)
                .await,
            Err(ToolError::Search(_))
        ));
    }
}
