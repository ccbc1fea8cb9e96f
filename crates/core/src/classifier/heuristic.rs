use super::ScreeningClassifier;
use crate::screening::{Classification, ScreeningStatus};
use async_trait::async_trait;

/// Terms indicating clear adverse findings. Checked before [`AMBIGUOUS_KEYWORDS`].
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "sanction",
    "convicted",
    "fraud",
    "arrest",
    "scam",
    "money laundering",
];

/// Terms indicating unresolved or investigatory content.
pub const AMBIGUOUS_KEYWORDS: &[&str] = &[
    "investigation",
    "alleged",
    "accused",
    "controversy",
    "lawsuit",
];

const NOK_SUMMARY: &str = "Search results contain terms associated with sanctions, convictions, fraud or other \
     financial crime. The subject is treated as having adverse findings pending analyst confirmation.";
const AMBIGUOUS_SUMMARY: &str = "Search results mention investigations, allegations or litigation without a clear \
     outcome. Manual review is required before a decision can be made.";
const OK_SUMMARY: &str = "No adverse-media or sanctions terms were found in the search results.";

/// Keyword-matching classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Decides the status from keyword presence alone.
    pub fn status_for(text: &str) -> ScreeningStatus {
        let lowered = text.to_lowercase();
        if NEGATIVE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            ScreeningStatus::Nok
        } else if AMBIGUOUS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            ScreeningStatus::Ambiguous
        } else {
            ScreeningStatus::Ok
        }
    }
}

#[async_trait]
impl ScreeningClassifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, search_text: &str) -> Classification {
        let result = Self::status_for(search_text);
        let summary = match result {
            ScreeningStatus::Nok => NOK_SUMMARY,
            ScreeningStatus::Ambiguous => AMBIGUOUS_SUMMARY,
            ScreeningStatus::Ok => OK_SUMMARY,
        };
        tracing::info!(result = %result, "keyword screening classification");

        Classification {
            result,
            summary: summary.to_string(),
            search_digest: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn negative_keyword_wins_over_ambiguous() {
        let text = "He was CONVICTED in 2019 after a long investigation and alleged misconduct.";
        let classification = KeywordClassifier::new().classify(text).await;
        assert_eq!(classification.result, ScreeningStatus::Nok);
        assert!(!classification.summary.is_empty());
    }

    #[tokio::test]
    async fn no_keywords_is_ok() {
        let text = "Jane Roe is a software engineer who speaks at conferences.";
        let classification = KeywordClassifier::new().classify(text).await;
        assert_eq!(classification.result, ScreeningStatus::Ok);
        assert_eq!(classification.summary, OK_SUMMARY);
    }

    #[test]
    fn ambiguous_keyword_alone() {
        assert_eq!(
            KeywordClassifier::status_for("Subject named in a civil lawsuit"),
            ScreeningStatus::Ambiguous
        );
    }

    #[test]
    fn multi_word_keyword_matches() {
        assert_eq!(
            KeywordClassifier::status_for("charged with Money Laundering"),
            ScreeningStatus::Nok
        );
    }

    #[test]
    fn every_negative_keyword_is_nok() {
        for keyword in NEGATIVE_KEYWORDS {
            assert_eq!(
                KeywordClassifier::status_for(keyword),
                ScreeningStatus::Nok,
                "{}",
                keyword
            );
        }
        for keyword in AMBIGUOUS_KEYWORDS {
            assert_eq!(
                KeywordClassifier::status_for(keyword),
                ScreeningStatus::Ambiguous,
                "{}",
                keyword
            );
        }
    }
}
