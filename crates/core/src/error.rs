use crate::llm::LlmError;
use crate::search::SearchError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum KycError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("tool failed: {0}")]
    Tool(String),
    #[error("failed to serialize screening data: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize screening data at `{path}`: {source}")]
    Deserialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("model error: {0}")]
    Llm(#[from] LlmError),
    #[error("search error: {0}")]
    Search(#[from] SearchError),
    #[error("invalid text: {0}")]
    Text(#[from] kyc_types::TextError),
}

pub type KycResult<T> = std::result::Result<T, KycError>;

impl From<serde_path_to_error::Error<serde_json::Error>> for KycError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        KycError::Deserialization {
            path,
            source: err.into_inner(),
        }
    }
}
