//! Third-party API keys.
//!
//! Keys are resolved once at startup by [`SecretsLoader`] and handed to the clients that need
//! them. Explicitly supplied values win; otherwise the parameter store is consulted. Loading
//! never fails: each key ends up either loaded or missing, and the [`SecretsReport`] says which
//! and why. Key values are never logged.

use crate::config::CoreConfig;
use crate::store::ParameterStore;
use std::fmt;
use std::sync::Arc;

/// API keys for the chat model and search providers.
#[derive(Clone, Default)]
pub struct Secrets {
    openai_api_key: Option<String>,
    tavily_api_key: Option<String>,
}

impl Secrets {
    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref()
    }

    pub fn tavily_api_key(&self) -> Option<&str> {
        self.tavily_api_key.as_deref()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |key: &Option<String>| if key.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("tavily_api_key", &mask(&self.tavily_api_key))
            .finish()
    }
}

/// Where a loaded key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Explicit,
    ParameterStore,
}

/// Outcome of resolving one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretStatus {
    Loaded(SecretSource),
    Missing(String),
}

impl SecretStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, SecretStatus::Loaded(_))
    }
}

/// Per-key loading outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsReport {
    pub openai: SecretStatus,
    pub tavily: SecretStatus,
}

impl SecretsReport {
    pub fn all_loaded(&self) -> bool {
        self.openai.is_loaded() && self.tavily.is_loaded()
    }

    /// Logs one line per key.
    pub fn log(&self) {
        for (label, status) in [("openai", &self.openai), ("tavily", &self.tavily)] {
            match status {
                SecretStatus::Loaded(source) => {
                    tracing::info!(key = label, ?source, "API key loaded")
                }
                SecretStatus::Missing(reason) => {
                    tracing::warn!(key = label, "API key not available: {}", reason)
                }
            }
        }
    }
}

/// Resolves [`Secrets`] from explicit values and a parameter store.
#[derive(Clone)]
pub struct SecretsLoader {
    openai_param: String,
    tavily_param: String,
    explicit_openai: Option<String>,
    explicit_tavily: Option<String>,
    parameters: Option<Arc<dyn ParameterStore>>,
}

impl SecretsLoader {
    /// Loader reading the parameter names configured in `cfg`.
    pub fn new(cfg: &CoreConfig) -> Self {
        Self {
            openai_param: cfg.openai_key_param().to_string(),
            tavily_param: cfg.tavily_key_param().to_string(),
            explicit_openai: None,
            explicit_tavily: None,
            parameters: None,
        }
    }

    /// Explicit key values, typically `OPENAI_API_KEY` and `TAVILY_API_KEY`. Blank values are
    /// ignored.
    pub fn with_explicit(mut self, openai: Option<String>, tavily: Option<String>) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        self.explicit_openai = present(openai);
        self.explicit_tavily = present(tavily);
        self
    }

    pub fn with_parameter_store(mut self, parameters: Arc<dyn ParameterStore>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Resolves both keys.
    pub async fn load(&self) -> (Secrets, SecretsReport) {
        let (openai_api_key, openai) = self
            .resolve(self.explicit_openai.as_ref(), &self.openai_param)
            .await;
        let (tavily_api_key, tavily) = self
            .resolve(self.explicit_tavily.as_ref(), &self.tavily_param)
            .await;

        (
            Secrets {
                openai_api_key,
                tavily_api_key,
            },
            SecretsReport { openai, tavily },
        )
    }

    async fn resolve(
        &self,
        explicit: Option<&String>,
        param: &str,
    ) -> (Option<String>, SecretStatus) {
        if let Some(value) = explicit {
            return (
                Some(value.clone()),
                SecretStatus::Loaded(SecretSource::Explicit),
            );
        }

        let Some(parameters) = &self.parameters else {
            return (
                None,
                SecretStatus::Missing("no explicit value and no parameter store".into()),
            );
        };

        match parameters.get_parameter(param, true).await {
            Ok(value) if !value.trim().is_empty() => (
                Some(value),
                SecretStatus::Loaded(SecretSource::ParameterStore),
            ),
            Ok(_) => (
                None,
                SecretStatus::Missing(format!("parameter {} is empty", param)),
            ),
            Err(e) => (None, SecretStatus::Missing(e.to_string())),
        }
    }
}
