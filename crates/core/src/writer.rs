//! Case-update writer.
//!
//! Folds a screening outcome into the case record: the status is normalised, a markdown report
//! is rendered and uploaded, and `stages.screening` on the case is replaced with a fresh stage
//! record.
//!
//! The writer is best-effort. It never returns an error to its caller; every failure is logged
//! and reported through [`UpdateStatus`]. A report upload failure does not stop the case update,
//! and a failed case update does not remove an already uploaded report.

use crate::config::CoreConfig;
use crate::constants::{screening_report_key, MARKDOWN_CONTENT_TYPE, SCREENING_STAGE, UNKNOWN};
use crate::report::ScreeningReport;
use crate::screening::{FinalDecision, ScreeningOutcome, ScreeningStatus};
use crate::store::{CaseStore, ObjectStore};
use crate::{KycError, KycResult};
use chrono::{DateTime, Utc};
use kyc_types::CaseId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Anything that exposes the raw text produced by a task.
pub trait RawOutput {
    fn raw(&self) -> &str;
}

/// The shapes a screening outcome can arrive in.
#[derive(Debug, Clone)]
pub enum OutcomeInput {
    /// Already-parsed JSON document.
    Record(Value),
    /// JSON-encoded document.
    Json(String),
}

impl OutcomeInput {
    /// Takes the raw text of a task output as a JSON document.
    pub fn from_raw<T: RawOutput + ?Sized>(output: &T) -> Self {
        Self::Json(output.raw().to_string())
    }

    fn into_value(self) -> KycResult<Value> {
        match self {
            Self::Record(value) => Ok(value),
            Self::Json(text) => {
                let mut de = serde_json::Deserializer::from_str(&text);
                let value = serde_path_to_error::deserialize(&mut de)?;
                de.end().map_err(|source| KycError::Deserialization {
                    path: ".".into(),
                    source,
                })?;
                Ok(value)
            }
        }
    }
}

impl From<Value> for OutcomeInput {
    fn from(value: Value) -> Self {
        Self::Record(value)
    }
}

impl From<String> for OutcomeInput {
    fn from(text: String) -> Self {
        Self::Json(text)
    }
}

impl From<&str> for OutcomeInput {
    fn from(text: &str) -> Self {
        Self::Json(text.to_string())
    }
}

impl TryFrom<&ScreeningOutcome> for OutcomeInput {
    type Error = KycError;

    fn try_from(outcome: &ScreeningOutcome) -> Result<Self, Self::Error> {
        serde_json::to_value(outcome)
            .map(Self::Record)
            .map_err(KycError::Serialization)
    }
}

/// Outcome fields as they may appear on the wire; every field is optional until validated.
#[derive(Debug, Default, Deserialize)]
struct PartialOutcome {
    #[serde(default)]
    case_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    analysis_result: Option<String>,
    #[serde(default)]
    analysis_summary: Option<String>,
    #[serde(default)]
    search_results_summary: Option<String>,
}

/// Validated outcome ready to be written.
#[derive(Debug)]
struct ValidOutcome {
    case_id: CaseId,
    name: String,
    analysis_result: String,
    analysis_summary: String,
    search_results_summary: String,
}

impl PartialOutcome {
    fn decode(value: Value) -> KycResult<Self> {
        Ok(serde_path_to_error::deserialize(value)?)
    }

    fn validate(self) -> KycResult<ValidOutcome> {
        // Present means non-empty; whitespace is left to status normalisation.
        let required = |value: Option<String>, field: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| KycError::InvalidInput(format!("missing {}", field)))
        };

        let case_id = required(self.case_id, "case_id")?;
        let analysis_result = required(self.analysis_result, "analysis_result")?;
        let analysis_summary = required(self.analysis_summary, "analysis_summary")?;

        Ok(ValidOutcome {
            case_id: CaseId::parse(&case_id)?,
            analysis_result,
            analysis_summary,
            name: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            search_results_summary: self.search_results_summary.unwrap_or_default(),
        })
    }
}

/// Location of an uploaded report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPointer {
    pub bucket: String,
    pub key: String,
}

/// The `stages.screening` record stored on a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningStage {
    pub result: ScreeningStatus,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    pub summary: String,
    #[serde(rename = "finalDecision")]
    pub final_decision: FinalDecision,
    #[serde(rename = "reportS3", default, skip_serializing_if = "Option::is_none")]
    pub report_s3: Option<ReportPointer>,
}

/// What a call to [`CaseUpdateWriter::update`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The input was malformed or incomplete; nothing was written.
    Skipped(String),
    /// The stage record was stored.
    Persisted(ScreeningStage),
    /// The stage record was built but the case store rejected it.
    PersistFailed(ScreeningStage),
}

/// Formats a timestamp as ISO-8601 UTC with second precision and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Writes screening outcomes into case records.
#[derive(Clone)]
pub struct CaseUpdateWriter {
    cfg: Arc<CoreConfig>,
    cases: Arc<dyn CaseStore>,
    objects: Arc<dyn ObjectStore>,
}

impl CaseUpdateWriter {
    pub fn new(
        cfg: Arc<CoreConfig>,
        cases: Arc<dyn CaseStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            cfg,
            cases,
            objects,
        }
    }

    /// Writes `input` into its case using the current time.
    pub async fn update(&self, input: impl Into<OutcomeInput>) -> UpdateStatus {
        self.update_at(input, Utc::now()).await
    }

    /// Writes `input` into its case, stamping it with `now`.
    ///
    /// Steps, in order:
    /// 1. decode the input (a decode failure skips the update),
    /// 2. require `case_id`, `analysis_result` and `analysis_summary`,
    /// 3. normalise the status and derive the final decision,
    /// 4. render and upload the markdown report (failure only drops the pointer),
    /// 5. merge the stage record into `stages.screening`.
    pub async fn update_at(&self, input: impl Into<OutcomeInput>, now: DateTime<Utc>) -> UpdateStatus {
        let outcome = match input
            .into()
            .into_value()
            .and_then(PartialOutcome::decode)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("screening outcome is not valid JSON: {}", e);
                return UpdateStatus::Skipped(e.to_string());
            }
        };
        tracing::debug!(?outcome, "screening outcome received");

        let outcome = match outcome.validate() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::info!("screening results incomplete, case not updated: {}", e);
                return UpdateStatus::Skipped(e.to_string());
            }
        };

        let status = ScreeningStatus::normalize(&outcome.analysis_result);
        let final_decision = status.final_decision();
        let updated_at = format_timestamp(now);

        let report = ScreeningReport {
            case_id: outcome.case_id.as_str(),
            name: &outcome.name,
            analysis_result: status.as_str(),
            analysis_summary: &outcome.analysis_summary,
            search_results_summary: &outcome.search_results_summary,
            updated_at: &updated_at,
        }
        .render();

        let report_s3 = self.upload_report(&outcome.case_id, report).await;

        let stage = ScreeningStage {
            result: status,
            updated_at,
            summary: outcome.analysis_summary,
            final_decision,
            report_s3,
        };

        let record = match serde_json::to_value(&stage) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("failed to serialize screening stage: {}", e);
                return UpdateStatus::PersistFailed(stage);
            }
        };

        match self
            .cases
            .merge_stage(outcome.case_id.as_str(), SCREENING_STAGE, record)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    case_id = %outcome.case_id,
                    status = %status,
                    final_decision = %final_decision,
                    "screening result stored"
                );
                UpdateStatus::Persisted(stage)
            }
            Err(e) => {
                tracing::error!(case_id = %outcome.case_id, "failed to store screening result: {}", e);
                UpdateStatus::PersistFailed(stage)
            }
        }
    }

    async fn upload_report(&self, case_id: &CaseId, report: String) -> Option<ReportPointer> {
        let bucket = self.cfg.results_bucket();
        let key = screening_report_key(case_id.as_str());

        match self
            .objects
            .put_object(bucket, &key, report.into_bytes(), MARKDOWN_CONTENT_TYPE)
            .await
        {
            Ok(()) => {
                tracing::info!("screening report uploaded to s3://{}/{}", bucket, key);
                Some(ReportPointer {
                    bucket: bucket.to_string(),
                    key,
                })
            }
            Err(e) => {
                tracing::error!("failed to upload screening report: {}", e);
                None
            }
        }
    }
}
