//! Markdown rendering of screening reports.
//!
//! The report is the human-readable artefact uploaded next to a case. Its layout is fixed:
//!
//! ```markdown
//! # KYC Screening Report
//!
//! **Case ID:** `<case id>`
//! **Subject:** <name>
//! **Report generated:** <timestamp>
//!
//! ---
//!
//! ## Search results summary
//!
//! <summary, or a placeholder>
//!
//! ---
//!
//! ## Screening result
//!
//! **Result:** <emoji> **<status>**
//!
//! **Analysis summary:**
//!
//! <analysis summary>
//! ```

use crate::screening::status_emoji;

/// Title line of every screening report.
const REPORT_HEADER: &str = "# KYC Screening Report";

/// Shown when the search produced no summary.
const NO_SEARCH_SUMMARY: &str = "_No search results summary available._";

/// Inputs to a screening report.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningReport<'a> {
    pub case_id: &'a str,
    pub name: &'a str,
    /// Status string as it should appear in the report; unknown values get `❓`.
    pub analysis_result: &'a str,
    pub analysis_summary: &'a str,
    pub search_results_summary: &'a str,
    pub updated_at: &'a str,
}

impl ScreeningReport<'_> {
    /// Renders the report. Lines are joined with `\n` and the document ends with a newline.
    pub fn render(&self) -> String {
        let search_summary = if self.search_results_summary.is_empty() {
            NO_SEARCH_SUMMARY
        } else {
            self.search_results_summary
        };

        let lines = [
            REPORT_HEADER.to_string(),
            String::new(),
            format!("**Case ID:** `{}`", self.case_id),
            format!("**Subject:** {}", self.name),
            format!("**Report generated:** {}", self.updated_at),
            String::new(),
            "---".to_string(),
            String::new(),
            "## Search results summary".to_string(),
            String::new(),
            search_summary.to_string(),
            String::new(),
            "---".to_string(),
            String::new(),
            "## Screening result".to_string(),
            String::new(),
            format!(
                "**Result:** {} **{}**",
                status_emoji(self.analysis_result),
                self.analysis_result
            ),
            String::new(),
            "**Analysis summary:**".to_string(),
            String::new(),
            self.analysis_summary.to_string(),
            String::new(),
        ];

        lines.join("\n")
    }
}
