//! Screening vocabulary.
//!
//! Every screening result in the system is one of exactly three statuses. Free-text results
//! coming back from the model or from upstream tools are folded into that set by
//! [`ScreeningStatus::normalize`], which fails safe to `AMBIGUOUS` so that anything unexpected
//! ends up in manual review.

use crate::constants::UNKNOWN;
use serde::{Deserialize, Serialize};

/// Normalised outcome of a screening.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScreeningStatus {
    /// No adverse findings.
    Ok,
    /// Clear adverse findings.
    Nok,
    /// Unclear or investigatory content; needs a human.
    Ambiguous,
}

impl ScreeningStatus {
    pub const ALL: [ScreeningStatus; 3] = [Self::Ok, Self::Nok, Self::Ambiguous];

    /// Maps a free-text result onto the status set.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. Besides the canonical
    /// names, the long forms `screening ok` and `screening not ok` are accepted. Anything else,
    /// including the empty string, yields `Ambiguous`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ok" | "screening ok" => Self::Ok,
            "nok" | "screening not ok" => Self::Nok,
            "ambiguous" => Self::Ambiguous,
            _ => Self::Ambiguous,
        }
    }

    /// Strict membership check used on model output: the value is upper-cased and must then be
    /// one of the canonical names.
    pub fn parse_canonical(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NOK" => Some(Self::Nok),
            "AMBIGUOUS" => Some(Self::Ambiguous),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Nok => "NOK",
            Self::Ambiguous => "AMBIGUOUS",
        }
    }

    pub fn emoji(&self) -> &'static str {
        status_emoji(self.as_str())
    }

    pub fn final_decision(&self) -> FinalDecision {
        FinalDecision::from(*self)
    }
}

impl std::fmt::Display for ScreeningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-level decision derived from the screening status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalDecision {
    Ok,
    NotOk,
    PendingReview,
}

impl FinalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotOk => "NOT_OK",
            Self::PendingReview => "PENDING_REVIEW",
        }
    }
}

impl From<ScreeningStatus> for FinalDecision {
    fn from(status: ScreeningStatus) -> Self {
        match status {
            ScreeningStatus::Ok => Self::Ok,
            ScreeningStatus::Nok => Self::NotOk,
            ScreeningStatus::Ambiguous => Self::PendingReview,
        }
    }
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emoji shown next to a raw status string in reports; `❓` for anything unrecognised.
pub fn status_emoji(raw: &str) -> &'static str {
    match raw {
        "OK" => "✅",
        "NOK" => "❌",
        "AMBIGUOUS" => "⚠️",
        _ => "❓",
    }
}

/// Result of classifying a block of search text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub result: ScreeningStatus,
    /// Rationale for the result. Never empty.
    pub summary: String,
    /// Digest of what the search returned. May be empty.
    pub search_digest: String,
}

/// Screening outcome handed from the analysis tool to the case writer.
///
/// This is the JSON document the crew returns as its raw result, so field names follow the
/// tool's wire format rather than the case-store schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub case_id: String,
    #[serde(default = "unknown")]
    pub name: String,
    pub analysis_result: String,
    pub analysis_summary: String,
    #[serde(default)]
    pub search_results_summary: String,
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

impl ScreeningOutcome {
    pub fn from_classification(
        case_id: impl Into<String>,
        name: impl Into<String>,
        classification: Classification,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            name: name.into(),
            analysis_result: classification.result.as_str().to_string(),
            analysis_summary: classification.summary,
            search_results_summary: classification.search_digest,
        }
    }
}
