//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables;
//! binaries read the environment, feed the raw values through the parsers here, and hand the
//! resulting [`CoreConfig`] to the services they construct.

use crate::constants::{
    DEFAULT_CASES_TABLE, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_KEY_PARAM,
    DEFAULT_RESULTS_BUCKET, DEFAULT_TAVILY_BASE_URL, DEFAULT_TAVILY_KEY_PARAM,
};
use crate::{KycError, KycResult};
use std::str::FromStr;

/// Which screening classifier strategy to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClassifierKind {
    /// Ask the chat model to classify the search results.
    #[default]
    Model,
    /// Keyword matching, no outbound calls.
    Heuristic,
}

impl FromStr for ClassifierKind {
    type Err = KycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" | "llm" => Ok(Self::Model),
            "heuristic" | "keyword" | "keywords" => Ok(Self::Heuristic),
            other => Err(KycError::Config(format!(
                "unknown classifier '{}' (expected 'model' or 'heuristic')",
                other
            ))),
        }
    }
}

/// What the runtime does with an invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AgentMode {
    /// Run the screening crew and answer with a single JSON document.
    #[default]
    Screening,
    /// Answer free-form prompts, streaming model output as it arrives.
    Assistant,
}

impl FromStr for AgentMode {
    type Err = KycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screening" => Ok(Self::Screening),
            "assistant" => Ok(Self::Assistant),
            other => Err(KycError::Config(format!(
                "unknown agent mode '{}' (expected 'screening' or 'assistant')",
                other
            ))),
        }
    }
}

/// Where cases, reports and parameters live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Aws,
    /// Process-local stores; nothing survives a restart.
    Memory,
}

impl FromStr for Backend {
    type Err = KycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(KycError::Config(format!(
                "unknown backend '{}' (expected 'aws' or 'memory')",
                other
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    cases_table: String,
    results_bucket: String,
    classifier: ClassifierKind,
    agent_mode: AgentMode,
    model: String,
    openai_base_url: String,
    tavily_base_url: String,
    openai_key_param: String,
    tavily_key_param: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default model, endpoints and parameter names.
    ///
    /// # Errors
    ///
    /// Returns `KycError::Config` if the table or bucket name is blank.
    pub fn new(cases_table: String, results_bucket: String) -> KycResult<Self> {
        if cases_table.trim().is_empty() {
            return Err(KycError::Config("cases table name cannot be empty".into()));
        }
        if results_bucket.trim().is_empty() {
            return Err(KycError::Config("results bucket name cannot be empty".into()));
        }

        Ok(Self {
            cases_table,
            results_bucket,
            classifier: ClassifierKind::default(),
            agent_mode: AgentMode::default(),
            model: DEFAULT_MODEL.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            tavily_base_url: DEFAULT_TAVILY_BASE_URL.into(),
            openai_key_param: DEFAULT_OPENAI_KEY_PARAM.into(),
            tavily_key_param: DEFAULT_TAVILY_KEY_PARAM.into(),
        })
    }

    pub fn with_classifier(mut self, classifier: ClassifierKind) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_agent_mode(mut self, agent_mode: AgentMode) -> Self {
        self.agent_mode = agent_mode;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_openai_base_url(mut self, url: String) -> Self {
        self.openai_base_url = url;
        self
    }

    pub fn with_tavily_base_url(mut self, url: String) -> Self {
        self.tavily_base_url = url;
        self
    }

    pub fn with_key_params(mut self, openai_key_param: String, tavily_key_param: String) -> Self {
        self.openai_key_param = openai_key_param;
        self.tavily_key_param = tavily_key_param;
        self
    }

    pub fn cases_table(&self) -> &str {
        &self.cases_table
    }

    pub fn results_bucket(&self) -> &str {
        &self.results_bucket
    }

    pub fn classifier(&self) -> ClassifierKind {
        self.classifier
    }

    pub fn agent_mode(&self) -> AgentMode {
        self.agent_mode
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    pub fn tavily_base_url(&self) -> &str {
        &self.tavily_base_url
    }

    pub fn openai_key_param(&self) -> &str {
        &self.openai_key_param
    }

    pub fn tavily_key_param(&self) -> &str {
        &self.tavily_key_param
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cases_table: DEFAULT_CASES_TABLE.into(),
            results_bucket: DEFAULT_RESULTS_BUCKET.into(),
            classifier: ClassifierKind::default(),
            agent_mode: AgentMode::default(),
            model: DEFAULT_MODEL.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            tavily_base_url: DEFAULT_TAVILY_BASE_URL.into(),
            openai_key_param: DEFAULT_OPENAI_KEY_PARAM.into(),
            tavily_key_param: DEFAULT_TAVILY_KEY_PARAM.into(),
        }
    }
}

/// Environment variable names read by the binaries.
pub mod env {
    pub const ADDR: &str = "KYC_ADDR";
    pub const CASES_TABLE: &str = "KYC_CASES_TABLE";
    pub const RESULTS_BUCKET: &str = "KYC_RESULTS_BUCKET";
    pub const CLASSIFIER: &str = "KYC_CLASSIFIER";
    pub const AGENT_MODE: &str = "KYC_AGENT_MODE";
    pub const BACKEND: &str = "KYC_BACKEND";
    pub const SEED_CASES: &str = "KYC_SEED_CASES";
    pub const MODEL: &str = "KYC_MODEL";
    pub const OPENAI_BASE_URL: &str = "KYC_OPENAI_BASE_URL";
    pub const TAVILY_BASE_URL: &str = "KYC_TAVILY_BASE_URL";
    pub const OPENAI_KEY_PARAM: &str = "KYC_OPENAI_KEY_PARAM";
    pub const TAVILY_KEY_PARAM: &str = "KYC_TAVILY_KEY_PARAM";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
}

/// Default listen address of the runtime.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

impl CoreConfig {
    /// Builds a configuration from raw values looked up by variable name.
    ///
    /// Binaries pass `|name| std::env::var(name).ok()`; tests pass a map.
    ///
    /// # Errors
    ///
    /// Returns `KycError::Config` for unrecognised classifier or agent mode values.
    pub fn from_lookup<F>(lookup: F) -> KycResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Self::new(
            string_from_env_value(lookup(env::CASES_TABLE), DEFAULT_CASES_TABLE),
            string_from_env_value(lookup(env::RESULTS_BUCKET), DEFAULT_RESULTS_BUCKET),
        )?
        .with_classifier(parse_from_env_value(lookup(env::CLASSIFIER))?)
        .with_agent_mode(parse_from_env_value(lookup(env::AGENT_MODE))?)
        .with_model(string_from_env_value(lookup(env::MODEL), DEFAULT_MODEL))
        .with_openai_base_url(string_from_env_value(
            lookup(env::OPENAI_BASE_URL),
            DEFAULT_OPENAI_BASE_URL,
        ))
        .with_tavily_base_url(string_from_env_value(
            lookup(env::TAVILY_BASE_URL),
            DEFAULT_TAVILY_BASE_URL,
        ))
        .with_key_params(
            string_from_env_value(lookup(env::OPENAI_KEY_PARAM), DEFAULT_OPENAI_KEY_PARAM),
            string_from_env_value(lookup(env::TAVILY_KEY_PARAM), DEFAULT_TAVILY_KEY_PARAM),
        );

        Ok(cfg)
    }
}

/// Returns the trimmed value, or `default` when the value is missing or blank.
pub fn string_from_env_value(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment value, falling back to the type's default when it is
/// missing or blank.
///
/// # Errors
///
/// Returns the parser's error when a non-blank value is not recognised.
pub fn parse_from_env_value<T>(value: Option<String>) -> KycResult<T>
where
    T: FromStr<Err = KycError> + Default,
{
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value.map(|v| v.parse::<T>()).transpose()?;

    Ok(parsed.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_lookup_reads_overrides() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("KYC_CASES_TABLE", "cases-dev"),
            ("KYC_CLASSIFIER", "Heuristic"),
            ("KYC_AGENT_MODE", "assistant"),
            ("KYC_MODEL", " "),
        ]
        .into_iter()
        .collect();
        let cfg = CoreConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.cases_table(), "cases-dev");
        assert_eq!(cfg.results_bucket(), "kyc-results");
        assert_eq!(cfg.classifier(), ClassifierKind::Heuristic);
        assert_eq!(cfg.agent_mode(), AgentMode::Assistant);
        assert_eq!(cfg.model(), DEFAULT_MODEL);
    }

    #[test]
    fn from_lookup_rejects_unknown_mode() {
        let err = CoreConfig::from_lookup(|name| (name == "KYC_AGENT_MODE").then(|| "chat".to_string()))
            .unwrap_err();
        assert!(matches!(err, KycError::Config(_)));
    }

    #[test]
    fn new_rejects_blank_table() {
        let err = CoreConfig::new("  ".into(), "bucket".into()).unwrap_err();
        assert!(matches!(err, KycError::Config(_)));
    }

    #[test]
    fn default_uses_documented_names() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.cases_table(), "kyc-cases");
        assert_eq!(cfg.results_bucket(), "kyc-results");
        assert_eq!(cfg.classifier(), ClassifierKind::Model);
        assert_eq!(cfg.agent_mode(), AgentMode::Screening);
    }

    #[test]
    fn parse_from_env_value_defaults_when_blank() {
        let kind: ClassifierKind = parse_from_env_value(Some("   ".into())).unwrap();
        assert_eq!(kind, ClassifierKind::Model);
        let backend: Backend = parse_from_env_value(None).unwrap();
        assert_eq!(backend, Backend::Aws);
    }

    #[test]
    fn parse_from_env_value_is_case_insensitive() {
        let kind: ClassifierKind = parse_from_env_value(Some("Heuristic".into())).unwrap();
        assert_eq!(kind, ClassifierKind::Heuristic);
        let mode: AgentMode = parse_from_env_value(Some("ASSISTANT".into())).unwrap();
        assert_eq!(mode, AgentMode::Assistant);
    }

    #[test]
    fn parse_from_env_value_rejects_unknown() {
        let result: KycResult<Backend> = parse_from_env_value(Some("gcp".into()));
        assert!(result.is_err());
    }

    #[test]
    fn string_from_env_value_trims() {
        assert_eq!(string_from_env_value(Some(" t ".into()), "d"), "t");
        assert_eq!(string_from_env_value(Some("".into()), "d"), "d");
    }
}
