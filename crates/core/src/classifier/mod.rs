//! Screening classifiers.
//!
//! A classifier reads web-search text about a person and decides whether the findings are
//! clean (`OK`), adverse (`NOK`) or unclear (`AMBIGUOUS`). Two strategies implement the same
//! [`ScreeningClassifier`] capability:
//!
//! - [`ModelClassifier`] asks a chat model using a fixed compliance-analyst prompt.
//! - [`KeywordClassifier`] matches fixed keyword lists and makes no outbound calls.
//!
//! Classification never fails: every problem is folded into an `AMBIGUOUS` result so the case
//! lands in manual review.

mod heuristic;
mod model;

pub use heuristic::{KeywordClassifier, AMBIGUOUS_KEYWORDS, NEGATIVE_KEYWORDS};
pub use model::{strip_code_fence, ModelClassifier, MAX_SEARCH_TEXT_CHARS};

use crate::config::ClassifierKind;
use crate::llm::ChatModel;
use crate::screening::Classification;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ScreeningClassifier: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Classifies `search_text`. Infallible by contract.
    async fn classify(&self, search_text: &str) -> Classification;
}

/// Picks the classifier strategy for `kind`.
///
/// The model strategy needs a chat model; when none is available the keyword strategy is used
/// instead and a warning is logged.
pub fn select_classifier(
    kind: ClassifierKind,
    model: Option<Arc<dyn ChatModel>>,
) -> Arc<dyn ScreeningClassifier> {
    match (kind, model) {
        (ClassifierKind::Model, Some(model)) => Arc::new(ModelClassifier::new(model)),
        (ClassifierKind::Model, None) => {
            tracing::warn!("model classifier requested but no chat model available; using keyword classifier");
            Arc::new(KeywordClassifier::new())
        }
        (ClassifierKind::Heuristic, _) => Arc::new(KeywordClassifier::new()),
    }
}
