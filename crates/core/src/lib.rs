//! # KYC Core
//!
//! Screening logic for the KYC runtime.
//!
//! This crate holds everything between an invocation and the case record:
//! - Status vocabulary and the two classifier strategies (model-backed and keyword)
//! - Chat model and web search clients behind traits
//! - Case, report and parameter store traits with in-memory implementations
//! - Markdown report rendering and the best-effort case-update writer
//! - The screening tools, the sequential screening crew and the streaming assistant
//! - Startup configuration and secret loading
//!
//! **No API concerns**: HTTP routing and wire types belong in `api-rest` and `api-shared`;
//! AWS clients live in `kyc-aws`.

#![warn(rust_2018_idioms)]

pub mod assistant;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod crew;
pub mod error;
pub mod llm;
pub mod report;
pub mod screening;
pub mod search;
pub mod secrets;
pub mod store;
pub mod tools;
pub mod writer;

pub use assistant::Assistant;
pub use classifier::{select_classifier, KeywordClassifier, ModelClassifier, ScreeningClassifier};
pub use config::{AgentMode, Backend, ClassifierKind, CoreConfig};
pub use crew::{CrewInput, ScreeningCrew, TaskOutput};
pub use error::{KycError, KycResult};
pub use llm::{
    ChatModel, LlmError, MockChatModel, OpenAiChatModel, SseDecoder, SseEvent, TextStream,
};
pub use screening::{Classification, FinalDecision, ScreeningOutcome, ScreeningStatus};
pub use search::{SearchError, SearchProvider, StaticSearch, TavilySearch};
pub use secrets::{Secrets, SecretsLoader, SecretsReport};
pub use store::{
    CaseStore, InMemoryCaseStore, InMemoryObjectStore, InMemoryParameterStore, ObjectStore,
    ParameterStore, StoreError,
};
pub use tools::ToolError;
pub use writer::{CaseUpdateWriter, OutcomeInput, UpdateStatus};
