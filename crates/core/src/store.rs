//! Storage seams.
//!
//! The runtime touches three external stores: the case table, the report bucket and the
//! parameter store holding API keys. Each is a trait here so the writer and tools can be
//! exercised without AWS; `kyc-aws` provides the production implementations.
//!
//! Case records are handled as `serde_json::Value` maps. Only a handful of fields are read
//! (`identity.fullName`, `status`) and exactly one is written (`stages.<stage>`), so the rest
//! of the document is carried through untouched.

use crate::constants::{CASE_KEY_ATTRIBUTE, STAGES_ATTRIBUTE};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("case store error: {0}")]
    Case(String),
    #[error("object store error: {0}")]
    Object(String),
    #[error("parameter store error: {0}")]
    Parameter(String),
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("conditional update still conflicting after {0} attempts")]
    Conflict(u32),
}

/// Key-value store holding KYC case records.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Fetches the case record, or `None` if no record has that id.
    async fn get_case(&self, case_id: &str) -> Result<Option<Value>, StoreError>;

    /// Sets `stages.<stage>` on the case record to `record`.
    ///
    /// The `stages` container is created if it is missing; other stages are left as they are;
    /// any previous value of this stage is overwritten.
    async fn merge_stage(&self, case_id: &str, stage: &str, record: Value)
        -> Result<(), StoreError>;
}

/// Object storage for rendered reports.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// Parameter store holding secrets.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<String, StoreError>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ============================================================================

/// Process-local case store.
///
/// Used by tests and by the runtime's `memory` backend. Counts merge calls and can be told to
/// fail them.
#[derive(Debug, Default)]
pub struct InMemoryCaseStore {
    cases: Mutex<HashMap<String, Value>>,
    merge_calls: AtomicUsize,
    fail_merges: AtomicBool,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a case record.
    pub fn insert(&self, case_id: &str, record: Value) {
        if let Ok(mut cases) = self.cases.lock() {
            cases.insert(case_id.to_string(), record);
        }
    }

    /// Builds a store from case records, each keyed by its `CaseId` attribute.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRecord` for a record without a string `CaseId`.
    pub fn from_records(records: Vec<Value>) -> Result<Self, StoreError> {
        let store = Self::new();
        for record in records {
            let case_id = record
                .get(CASE_KEY_ATTRIBUTE)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    StoreError::InvalidRecord(format!("record without {}", CASE_KEY_ATTRIBUTE))
                })?;
            store.insert(&case_id, record);
        }
        Ok(store)
    }

    pub fn with_case(self, case_id: &str, record: Value) -> Self {
        self.insert(case_id, record);
        self
    }

    /// Snapshot of a stored case.
    pub fn case(&self, case_id: &str) -> Option<Value> {
        self.cases.lock().ok()?.get(case_id).cloned()
    }

    /// Number of `merge_stage` calls received, successful or not.
    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_merges(&self, fail: bool) {
        self.fail_merges.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn get_case(&self, case_id: &str) -> Result<Option<Value>, StoreError> {
        let cases = self
            .cases
            .lock()
            .map_err(|_| StoreError::Case("case store lock poisoned".into()))?;
        Ok(cases.get(case_id).cloned())
    }

    async fn merge_stage(
        &self,
        case_id: &str,
        stage: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_merges.load(Ordering::SeqCst) {
            return Err(StoreError::Case("injected merge failure".into()));
        }

        let mut cases = self
            .cases
            .lock()
            .map_err(|_| StoreError::Case("case store lock poisoned".into()))?;

        let case = cases.entry(case_id.to_string()).or_insert_with(|| {
            let mut fresh = Map::new();
            fresh.insert(CASE_KEY_ATTRIBUTE.into(), Value::String(case_id.into()));
            Value::Object(fresh)
        });
        let case = case
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidRecord(format!("case {} is not a map", case_id)))?;

        let stages = case
            .entry(STAGES_ATTRIBUTE)
            .or_insert_with(|| Value::Object(Map::new()));
        let stages = stages.as_object_mut().ok_or_else(|| {
            StoreError::InvalidRecord(format!("case {} has a non-map `stages`", case_id))
        })?;
        stages.insert(stage.to_string(), record);

        Ok(())
    }
}

/// An object held by [`InMemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Process-local object store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    put_calls: AtomicUsize,
    fail_puts: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose uploads always fail.
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_puts.store(true, Ordering::SeqCst);
        store
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Object("injected upload failure".into()));
        }

        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Object("object store lock poisoned".into()))?;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

/// Fixed set of parameters.
#[derive(Debug, Default, Clone)]
pub struct InMemoryParameterStore {
    parameters: HashMap<String, String>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_parameter(&self, name: &str, _with_decryption: bool) -> Result<String, StoreError> {
        self.parameters
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ParameterNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn from_records_keys_by_case_id() {
        let store = InMemoryCaseStore::from_records(vec![
            json!({"CaseId": "C1", "identity": {"fullName": "Jane Roe"}}),
            json!({"CaseId": "C2"}),
        ])
        .unwrap();
        assert!(store.get_case("C2").await.unwrap().is_some());
        assert_eq!(store.case("C1").unwrap()["identity"]["fullName"], "Jane Roe");

        let err = InMemoryCaseStore::from_records(vec![json!({"caseId": "C3"})]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn merge_stage_creates_stages_container() {
        let store = InMemoryCaseStore::new().with_case(
            "C1",
            json!({"CaseId": "C1", "status": "OPEN", "identity": {"fullName": "Jane Roe"}}),
        );

        store
            .merge_stage("C1", "screening", json!({"result": "OK"}))
            .await
            .unwrap();

        let case = store.case("C1").unwrap();
        assert_eq!(case["stages"]["screening"]["result"], "OK");
        assert_eq!(case["status"], "OPEN");
        assert_eq!(case["identity"]["fullName"], "Jane Roe");
    }

    #[tokio::test]
    async fn merge_stage_overwrites_only_its_stage() {
        let store = InMemoryCaseStore::new().with_case(
            "C1",
            json!({
                "CaseId": "C1",
                "stages": {
                    "documents": {"result": "OK"},
                    "screening": {"result": "NOK", "reportS3": {"bucket": "b", "key": "k"}}
                }
            }),
        );

        store
            .merge_stage("C1", "screening", json!({"result": "AMBIGUOUS"}))
            .await
            .unwrap();

        let case = store.case("C1").unwrap();
        assert_eq!(case["stages"]["documents"]["result"], "OK");
        assert_eq!(case["stages"]["screening"], json!({"result": "AMBIGUOUS"}));
    }

    #[tokio::test]
    async fn merge_stage_upserts_missing_case() {
        let store = InMemoryCaseStore::new();
        store
            .merge_stage("NEW", "screening", json!({"result": "OK"}))
            .await
            .unwrap();
        let case = store.case("NEW").unwrap();
        assert_eq!(case["CaseId"], "NEW");
        assert_eq!(case["stages"]["screening"]["result"], "OK");
    }

    #[tokio::test]
    async fn merge_stage_rejects_non_map_stages() {
        let store = InMemoryCaseStore::new().with_case("C1", json!({"stages": "broken"}));
        let err = store
            .merge_stage("C1", "screening", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn failing_object_store_counts_attempts() {
        let store = InMemoryObjectStore::failing();
        let result = store.put_object("b", "k", b"x".to_vec(), "text/plain").await;
        assert!(result.is_err());
        assert_eq!(store.put_calls(), 1);
        assert!(store.object("b", "k").is_none());
    }

    #[tokio::test]
    async fn parameter_store_reports_missing_names() {
        let store = InMemoryParameterStore::new().with_parameter("/a", "1");
        assert_eq!(store.get_parameter("/a", true).await.unwrap(), "1");
        assert!(matches!(
            store.get_parameter("/b", true).await,
            Err(StoreError::ParameterNotFound(name)) if name == "/b"
        ));
    }
}
