//! Screening crew.
//!
//! Runs the screening task as a fixed sequence of tool calls:
//!
//! 1. fetch case details ([`GetCaseDetailsTool`]),
//! 2. search the web for the subject ([`SearchPersonTool`]),
//! 3. classify the findings ([`ScreeningAnalysisTool`]),
//! 4. hand the outcome to the task callback ([`CaseUpdateWriter::update`]).
//!
//! Screening a bare name skips step 1 and step 4: there is no case to read or update.

use crate::classifier::ScreeningClassifier;
use crate::constants::UNKNOWN;
use crate::screening::{ScreeningOutcome, ScreeningStatus};
use crate::search::SearchProvider;
use crate::store::CaseStore;
use crate::tools::{GetCaseDetailsTool, ScreeningAnalysisTool, SearchPersonTool};
use crate::writer::{CaseUpdateWriter, OutcomeInput, RawOutput, UpdateStatus};
use crate::{KycError, KycResult};
use kyc_types::{CaseId, NonEmptyText};
use serde_json::{json, Value};
use std::sync::Arc;

/// What to screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrewInput {
    /// A stored case; the subject name comes from `identity.fullName`.
    Case(String),
    /// A bare person name.
    Name(String),
}

/// Final output of a crew run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    /// Screening outcome as pretty JSON.
    pub raw: String,
}

impl TaskOutput {
    /// Decodes the outcome carried in [`TaskOutput::raw`].
    pub fn outcome(&self) -> KycResult<ScreeningOutcome> {
        let mut de = serde_json::Deserializer::from_str(&self.raw);
        Ok(serde_path_to_error::deserialize(&mut de)?)
    }
}

impl RawOutput for TaskOutput {
    fn raw(&self) -> &str {
        &self.raw
    }
}

/// Sequential screening pipeline.
#[derive(Clone)]
pub struct ScreeningCrew {
    case_details: GetCaseDetailsTool,
    search_person: SearchPersonTool,
    analysis: ScreeningAnalysisTool,
    writer: CaseUpdateWriter,
}

impl ScreeningCrew {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        search: Arc<dyn SearchProvider>,
        classifier: Arc<dyn ScreeningClassifier>,
        writer: CaseUpdateWriter,
    ) -> Self {
        tracing::info!(classifier = classifier.name(), "screening crew ready");
        Self {
            case_details: GetCaseDetailsTool::new(cases),
            search_person: SearchPersonTool::new(search),
            analysis: ScreeningAnalysisTool::new(classifier),
            writer,
        }
    }

    /// Runs the screening task for `input`.
    ///
    /// # Errors
    ///
    /// Returns [`KycError::InvalidInput`] for a blank case id or name, and [`KycError::Tool`]
    /// when the case lookup fails or the analysis step rejects its inputs. Search failures do
    /// not error: the outcome is `AMBIGUOUS` with the failure in its summary.
    pub async fn kickoff(&self, input: CrewInput) -> KycResult<TaskOutput> {
        match input {
            CrewInput::Case(case_id) => self.screen_case(case_id.trim()).await,
            CrewInput::Name(name) => self.screen_name(name.trim()).await,
        }
    }

    async fn screen_case(&self, case_id: &str) -> KycResult<TaskOutput> {
        let case_id = CaseId::parse(case_id)
            .map_err(|_| KycError::InvalidInput("case id is empty".into()))?;
        let case_id = case_id.as_str();
        tracing::info!(case_id, "screening case");

        let details = self
            .case_details
            .fetch(case_id)
            .await
            .map_err(|e| KycError::Tool(e.to_string()))?;

        let case: Value = serde_json::from_str(&details).map_err(KycError::Serialization)?;
        let name = case
            .pointer("/identity/fullName")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty() && *n != UNKNOWN)
            .ok_or_else(|| KycError::Tool(format!("Case {} has no identity.fullName.", case_id)))?;

        let output = self.analyse(&details, name, Some(case_id)).await?;

        match self.writer.update(OutcomeInput::from_raw(&output)).await {
            UpdateStatus::Persisted(_) => {}
            UpdateStatus::PersistFailed(_) => {
                tracing::warn!(case_id, "screening result computed but not stored")
            }
            UpdateStatus::Skipped(reason) => {
                tracing::warn!(case_id, "screening result not stored: {}", reason)
            }
        }
        Ok(output)
    }

    async fn screen_name(&self, name: &str) -> KycResult<TaskOutput> {
        let name = NonEmptyText::new(name)
            .map_err(|_| KycError::InvalidInput("name is empty".into()))?;
        let name = name.as_str();
        tracing::info!("screening name without case");

        let details = json!({
            "case_id": UNKNOWN,
            "identity": { "fullName": name },
        })
        .to_string();
        self.analyse(&details, name, None).await
    }

    async fn analyse(
        &self,
        details: &str,
        name: &str,
        case_id: Option<&str>,
    ) -> KycResult<TaskOutput> {
        let raw = match self.search_person.search(name, case_id).await {
            Ok(search) => self.analysis.run(details, &search).await,
            Err(e) => {
                let failure = e.to_string();
                let outcome = ScreeningOutcome {
                    case_id: case_id.unwrap_or(UNKNOWN).to_string(),
                    name: name.to_string(),
                    analysis_result: ScreeningStatus::Ambiguous.as_str().to_string(),
                    analysis_summary: format!("{}. Manual review required.", failure.trim_end_matches('.')),
                    search_results_summary: String::new(),
                };
                serde_json::to_string_pretty(&outcome).map_err(KycError::Serialization)?
            }
        };

        if let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(&raw) {
            if let Some(error) = doc.get("error").and_then(Value::as_str) {
                return Err(KycError::Tool(error.to_string()));
            }
        }
        Ok(TaskOutput { raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;
    use crate::config::CoreConfig;
    use crate::search::StaticSearch;
    use crate::store::{InMemoryCaseStore, InMemoryObjectStore};

    struct Fixture {
        cases: Arc<InMemoryCaseStore>,
        crew: ScreeningCrew,
    }

    fn fixture(search: StaticSearch) -> Fixture {
        let cfg = Arc::new(CoreConfig::default());
        let cases = Arc::new(
            InMemoryCaseStore::new()
                .with_case("C1", json!({"CaseId": "C1", "identity": {"fullName": "Jane Roe"}}))
                .with_case("C2", json!({"CaseId": "C2", "status": "OPEN"})),
        );
        let writer = CaseUpdateWriter::new(
            cfg,
            cases.clone(),
            Arc::new(InMemoryObjectStore::new()),
        );
        let crew = ScreeningCrew::new(
            cases.clone(),
            Arc::new(search),
            Arc::new(KeywordClassifier::new()),
            writer,
        );
        Fixture { cases, crew }
    }

    #[tokio::test]
    async fn case_screening_updates_case() {
        let f = fixture(StaticSearch::new("Jane Roe was convicted of fraud in 2018."));
        let output = f.crew.kickoff(CrewInput::Case("C1".into())).await.unwrap();

        let outcome = output.outcome().unwrap();
        assert_eq!(outcome.case_id, "C1");
        assert_eq!(outcome.name, "Jane Roe");
        assert_eq!(outcome.analysis_result, "NOK");

        let case = f.cases.case("C1").unwrap();
        assert_eq!(case["stages"]["screening"]["result"], "NOK");
        assert_eq!(case["stages"]["screening"]["finalDecision"], "NOT_OK");
        assert_eq!(f.cases.merge_calls(), 1);
    }

    #[tokio::test]
    async fn name_screening_does_not_persist() {
        let f = fixture(StaticSearch::new("A well known pianist."));
        let output = f
            .crew
            .kickoff(CrewInput::Name(" Jane Roe ".into()))
            .await
            .unwrap();

        let outcome = output.outcome().unwrap();
        assert_eq!(outcome.case_id, "Unknown");
        assert_eq!(outcome.name, "Jane Roe");
        assert_eq!(outcome.analysis_result, "OK");
        assert_eq!(f.cases.merge_calls(), 0);
    }

    #[tokio::test]
    async fn missing_case_aborts_run() {
        let f = fixture(StaticSearch::new("text"));
        let err = f.crew.kickoff(CrewInput::Case("C404".into())).await.unwrap_err();
        match err {
            KycError::Tool(message) => assert_eq!(message, "Error: No case found for caseId C404."),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(f.cases.merge_calls(), 0);
    }

    #[tokio::test]
    async fn case_without_name_aborts_run() {
        let f = fixture(StaticSearch::new("text"));
        let err = f.crew.kickoff(CrewInput::Case("C2".into())).await.unwrap_err();
        assert!(matches!(err, KycError::Tool(_)));
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected() {
        let f = fixture(StaticSearch::new("text"));
        assert!(matches!(
            f.crew.kickoff(CrewInput::Case("  ".into())).await,
            Err(KycError::InvalidInput(_))
        ));
        assert!(matches!(
            f.crew.kickoff(CrewInput::Name(String::new())).await,
            Err(KycError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn search_failure_is_ambiguous_and_stored() {
        let f = fixture(StaticSearch::failing("rate limited"));
        let output = f.crew.kickoff(CrewInput::Case("C1".into())).await.unwrap();

        let outcome = output.outcome().unwrap();
        assert_eq!(outcome.analysis_result, "AMBIGUOUS");
        assert!(outcome.analysis_summary.contains("rate limited"));
        assert!(outcome.analysis_summary.ends_with("Manual review required."));

        let case = f.cases.case("C1").unwrap();
        assert_eq!(case["stages"]["screening"]["finalDecision"], "PENDING_REVIEW");
    }

    #[tokio::test]
    async fn search_text_starting_with_error_is_classified() {
        let f = fixture(StaticSearch::new("Error rates fell at the firm Jane Roe runs."));
        let output = f
            .crew
            .kickoff(CrewInput::Name("Jane Roe".into()))
            .await
            .unwrap();

        let outcome = output.outcome().unwrap();
        assert_eq!(outcome.analysis_result, "OK");
        assert!(!outcome.analysis_summary.contains("Manual review required."));
    }

    #[tokio::test]
    async fn case_id_with_separators_is_screened() {
        let f = fixture(StaticSearch::new("Jane Roe was convicted of fraud in 2018."));
        f.cases.insert(
            "ACME/2024/17",
            json!({"CaseId": "ACME/2024/17", "identity": {"fullName": "Jane Roe"}}),
        );
        let output = f
            .crew
            .kickoff(CrewInput::Case("ACME/2024/17".into()))
            .await
            .unwrap();

        assert_eq!(output.outcome().unwrap().case_id, "ACME/2024/17");
        let case = f.cases.case("ACME/2024/17").unwrap();
        assert_eq!(case["stages"]["screening"]["result"], "NOK");
    }
}
