//! Constants used throughout the KYC core crate.
//!
//! Names of stores, keys and parameters live here so the writer, the tools and the
//! AWS adapters agree on them.

/// Default case table name when `KYC_CASES_TABLE` is not set.
pub const DEFAULT_CASES_TABLE: &str = "kyc-cases";

/// Default bucket for rendered reports when `KYC_RESULTS_BUCKET` is not set.
pub const DEFAULT_RESULTS_BUCKET: &str = "kyc-results";

/// Partition key attribute of the case table.
pub const CASE_KEY_ATTRIBUTE: &str = "CaseId";

/// Container attribute holding per-stage results on a case record.
pub const STAGES_ATTRIBUTE: &str = "stages";

/// Stage name written by the screening writer.
pub const SCREENING_STAGE: &str = "screening";

/// Filename of the rendered screening report under a case prefix.
pub const SCREENING_REPORT_FILENAME: &str = "screening-report.md";

/// Content type used for the uploaded report.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown";

/// Default parameter-store name of the OpenAI API key.
pub const DEFAULT_OPENAI_KEY_PARAM: &str = "/ops-orchestrator/openai-api-key";

/// Default parameter-store name of the Tavily API key.
pub const DEFAULT_TAVILY_KEY_PARAM: &str = "/ops-orchestrator/tavily-api-key";

/// Default chat model used for classification.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Tavily API base URL.
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Placeholder used when a case id or subject name cannot be determined.
pub const UNKNOWN: &str = "Unknown";

/// Object key of the screening report for a case.
pub fn screening_report_key(case_id: &str) -> String {
    format!("cases/{}/{}", case_id, SCREENING_REPORT_FILENAME)
}
