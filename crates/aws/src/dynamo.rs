//! DynamoDB-backed case store.

use crate::attribute::{from_item, to_attribute};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use kyc_core::constants::{CASE_KEY_ATTRIBUTE, STAGES_ATTRIBUTE};
use kyc_core::store::{CaseStore, StoreError};
use serde_json::{Map, Value};

/// How many times the two-step merge is attempted before giving up.
pub const MAX_MERGE_ATTEMPTS: u32 = 3;

/// One conditional update making up a stage merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// Set `stages.<stage>` on a record whose `stages` map exists.
    SetStage,
    /// Create the `stages` map holding only this stage, when no map exists yet.
    CreateStages,
}

impl MergeStep {
    pub fn update_expression(self) -> &'static str {
        match self {
            MergeStep::SetStage => "SET #stages.#stage = :stage",
            MergeStep::CreateStages => "SET #stages = :stages",
        }
    }

    pub fn condition_expression(self) -> &'static str {
        match self {
            MergeStep::SetStage => "attribute_exists(#stages)",
            MergeStep::CreateStages => "attribute_not_exists(#stages)",
        }
    }
}

/// Case records in a DynamoDB table keyed by `CaseId`.
#[derive(Debug, Clone)]
pub struct DynamoCaseStore {
    client: Client,
    table: String,
}

impl DynamoCaseStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn key(case_id: &str) -> AttributeValue {
        AttributeValue::S(case_id.to_string())
    }

    /// Runs one merge step. `Ok(false)` means the condition did not hold.
    async fn apply(
        &self,
        step: MergeStep,
        case_id: &str,
        stage: &str,
        record: &Value,
    ) -> Result<bool, StoreError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(CASE_KEY_ATTRIBUTE, Self::key(case_id))
            .update_expression(step.update_expression())
            .condition_expression(step.condition_expression())
            .expression_attribute_names("#stages", STAGES_ATTRIBUTE);

        let request = match step {
            MergeStep::SetStage => request
                .expression_attribute_names("#stage", stage)
                .expression_attribute_values(":stage", to_attribute(record)),
            MergeStep::CreateStages => {
                let mut stages = Map::new();
                stages.insert(stage.to_string(), record.clone());
                request.expression_attribute_values(":stages", to_attribute(&Value::Object(stages)))
            }
        };

        match request.send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.err().is_conditional_check_failed_exception() => {
                Ok(false)
            }
            Err(e) => Err(update_error(e)),
        }
    }
}

fn update_error(e: SdkError<UpdateItemError>) -> StoreError {
    StoreError::Case(format!("{}", DisplayErrorContext(&e)))
}

#[async_trait]
impl CaseStore for DynamoCaseStore {
    async fn get_case(&self, case_id: &str) -> Result<Option<Value>, StoreError> {
        tracing::debug!(table = %self.table, case_id, "get_item");
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(CASE_KEY_ATTRIBUTE, Self::key(case_id))
            .send()
            .await
            .map_err(|e| StoreError::Case(format!("{}", DisplayErrorContext(&e))))?;

        Ok(output.item().map(from_item))
    }

    /// Sets `stages.<stage>` without touching sibling stages.
    ///
    /// Each step is a single conditional update. If the record already has a `stages` map the
    /// stage is set inside it; otherwise the map is created holding only this stage. A writer
    /// racing between the two steps makes the second condition fail, and the pair is retried
    /// up to [`MAX_MERGE_ATTEMPTS`] times.
    async fn merge_stage(
        &self,
        case_id: &str,
        stage: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            if self.apply(MergeStep::SetStage, case_id, stage, &record).await? {
                return Ok(());
            }
            if self.apply(MergeStep::CreateStages, case_id, stage, &record).await? {
                tracing::debug!(case_id, stage, "created stages map");
                return Ok(());
            }
            tracing::warn!(case_id, stage, attempt, "stage merge raced, retrying");
        }
        Err(StoreError::Conflict(MAX_MERGE_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::operation::update_item::{UpdateItemInput, UpdateItemOutput};
    use aws_sdk_dynamodb::types::error::ConditionalCheckFailedException;
    use aws_smithy_mocks::{mock, mock_client, Rule, RuleMode};
    use serde_json::json;

    fn condition_failed() -> UpdateItemError {
        UpdateItemError::ConditionalCheckFailedException(
            ConditionalCheckFailedException::builder()
                .message("The conditional request failed")
                .build(),
        )
    }

    fn is_step(req: &UpdateItemInput, step: MergeStep) -> bool {
        req.table_name() == Some("cases")
            && req.update_expression() == Some(step.update_expression())
            && req.condition_expression() == Some(step.condition_expression())
    }

    fn set_stage_is_well_formed(req: &UpdateItemInput) -> bool {
        is_step(req, MergeStep::SetStage)
            && req
                .expression_attribute_names()
                .and_then(|names| names.get("#stage"))
                .map(String::as_str)
                == Some("screening")
            && req
                .expression_attribute_values()
                .is_some_and(|values| values.contains_key(":stage"))
    }

    fn store(rules: &[&Rule]) -> DynamoCaseStore {
        let client = mock_client!(aws_sdk_dynamodb, RuleMode::MatchAny, rules);
        DynamoCaseStore::new(client, "cases")
    }

    fn stage() -> Value {
        json!({"result": "NOK", "summary": "x", "finalDecision": "NOT_OK"})
    }

    #[test]
    fn steps_have_complementary_conditions() {
        assert_eq!(
            MergeStep::SetStage.condition_expression(),
            "attribute_exists(#stages)"
        );
        assert_eq!(
            MergeStep::CreateStages.condition_expression(),
            "attribute_not_exists(#stages)"
        );
    }

    #[test]
    fn set_stage_only_touches_one_stage() {
        assert_eq!(
            MergeStep::SetStage.update_expression(),
            "SET #stages.#stage = :stage"
        );
        assert!(!MergeStep::CreateStages.update_expression().contains('.'));
    }

    #[tokio::test]
    async fn merge_sets_stage_inside_existing_map() {
        let set = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(set_stage_is_well_formed)
            .sequence()
            .output(|| UpdateItemOutput::builder().build())
            .build();
        let create = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| is_step(req, MergeStep::CreateStages))
            .sequence()
            .output(|| UpdateItemOutput::builder().build())
            .build();

        store(&[&set, &create])
            .merge_stage("C1", "screening", stage())
            .await
            .unwrap();
        assert_eq!(set.num_calls(), 1);
        // Sibling stages survive: the whole-map write never ran.
        assert_eq!(create.num_calls(), 0);
    }

    #[tokio::test]
    async fn merge_creates_map_when_missing() {
        let set = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| is_step(req, MergeStep::SetStage))
            .sequence()
            .error(condition_failed)
            .build();
        let create = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| {
                is_step(req, MergeStep::CreateStages)
                    && req
                        .expression_attribute_values()
                        .and_then(|values| values.get(":stages"))
                        .and_then(|stages| stages.as_m().ok())
                        .is_some_and(|stages| stages.len() == 1 && stages.contains_key("screening"))
            })
            .sequence()
            .output(|| UpdateItemOutput::builder().build())
            .build();

        store(&[&set, &create])
            .merge_stage("C1", "screening", stage())
            .await
            .unwrap();
        assert_eq!(set.num_calls(), 1);
        assert_eq!(create.num_calls(), 1);
    }

    #[tokio::test]
    async fn merge_retries_after_race() {
        // The map appears between the two steps, so both conditions fail once.
        let set = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| is_step(req, MergeStep::SetStage))
            .sequence()
            .error(condition_failed)
            .output(|| UpdateItemOutput::builder().build())
            .build();
        let create = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| is_step(req, MergeStep::CreateStages))
            .sequence()
            .error(condition_failed)
            .build();

        store(&[&set, &create])
            .merge_stage("C1", "screening", stage())
            .await
            .unwrap();
        assert_eq!(set.num_calls(), 2);
        assert_eq!(create.num_calls(), 1);
    }

    #[tokio::test]
    async fn merge_gives_up_after_max_attempts() {
        let set = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| is_step(req, MergeStep::SetStage))
            .sequence()
            .error(condition_failed)
            .times(MAX_MERGE_ATTEMPTS as usize)
            .build();
        let create = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| is_step(req, MergeStep::CreateStages))
            .sequence()
            .error(condition_failed)
            .times(MAX_MERGE_ATTEMPTS as usize)
            .build();

        let err = store(&[&set, &create])
            .merge_stage("C1", "screening", stage())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(MAX_MERGE_ATTEMPTS)), "{:?}", err);
        assert_eq!(set.num_calls(), MAX_MERGE_ATTEMPTS as usize);
        assert_eq!(create.num_calls(), MAX_MERGE_ATTEMPTS as usize);
    }
}
