//! Web search.
//!
//! Screening only needs "give me text about this query", so the provider seam is a single
//! method returning a readable digest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no API key configured for web search")]
    MissingApiKey,
    #[error("search query cannot be empty")]
    EmptyQuery,
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("search endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse search response: {0}")]
    ResponseParsing(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs `query` and returns the findings as plain text.
    async fn search(&self, query: &str) -> Result<String, SearchError>;
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    include_answer: bool,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily search API client.
#[derive(Clone)]
pub struct TavilySearch {
    base_url: String,
    api_key: String,
    max_results: u32,
    client: reqwest::Client,
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

impl TavilySearch {
    pub const DEFAULT_MAX_RESULTS: u32 = 5;

    /// # Errors
    ///
    /// Returns `SearchError::MissingApiKey` for a blank key, or `SearchError::HttpClient` if the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SearchError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            max_results: Self::DEFAULT_MAX_RESULTS,
            client,
        })
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<String, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let body = TavilyRequest {
            query,
            max_results: self.max_results,
            search_depth: "basic",
            include_answer: true,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::HttpClient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ResponseParsing(e.to_string()))?;

        Ok(render_digest(&parsed))
    }
}

fn render_digest(response: &TavilyResponse) -> String {
    let mut out = String::new();

    if let Some(answer) = response.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        out.push_str("Answer: ");
        out.push_str(answer.trim());
        out.push_str("\n\n");
    }

    for (i, result) in response.results.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, result.title.trim()));
        if !result.url.is_empty() {
            out.push_str(&format!("URL: {}\n", result.url));
        }
        out.push_str(result.content.trim());
        out.push_str("\n\n");
    }

    if out.is_empty() {
        return "No results found.".to_string();
    }
    out.trim_end().to_string()
}

/// Search provider returning a fixed body (or a fixed error) for every query.
#[derive(Debug, Clone)]
pub struct StaticSearch {
    response: Result<String, String>,
}

impl StaticSearch {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> Result<String, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        self.response.clone().map_err(SearchError::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lists_results_in_order() {
        let response: TavilyResponse = serde_json::from_str(
            r#"{
                "query": "q",
                "answer": "Short answer.",
                "results": [
                    {"title": "First", "url": "https://a.example", "content": "alpha", "score": 0.9},
                    {"title": "Second", "url": "https://b.example", "content": "beta", "score": 0.5}
                ]
            }"#,
        )
        .unwrap();

        let digest = render_digest(&response);
        assert!(digest.starts_with("Answer: Short answer."));
        let first = digest.find("[1] First").unwrap();
        let second = digest.find("[2] Second").unwrap();
        assert!(first < second);
        assert!(digest.contains("URL: https://b.example\nbeta"));
    }

    #[test]
    fn digest_of_empty_response() {
        let response: TavilyResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert_eq!(render_digest(&response), "No results found.");
    }

    #[tokio::test]
    async fn static_search_rejects_empty_query() {
        let search = StaticSearch::new("anything");
        assert!(matches!(
            search.search("  ").await,
            Err(SearchError::EmptyQuery)
        ));
        assert_eq!(search.search("x").await.unwrap(), "anything");
    }

    #[test]
    fn tavily_requires_key() {
        assert!(matches!(
            TavilySearch::new("https://api.tavily.com", ""),
            Err(SearchError::MissingApiKey)
        ));
    }
}
