//! JSON reporter
//!
//! Outputs the full Report as pretty-printed JSON. The output parses back
//! into an identical [`Report`] with [`parse`].

use super::Template;
use crate::error::{ReadscopeError, Result};
use crate::models::Report;

pub struct JsonTemplate;

impl Template for JsonTemplate {
    fn name(&self) -> &str {
        "json"
    }

    fn render(&self, report: &Report) -> Result<String> {
        render(report)
    }

    fn extension(&self) -> &str {
        "json"
    }
}

/// Render report as JSON
pub fn render(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| ReadscopeError::template(format!("cannot serialize report: {e}")))
}

/// Parse a report previously rendered with [`render`].
pub fn parse(text: &str) -> Result<Report> {
    serde_json::from_str(text)
        .map_err(|e| ReadscopeError::template(format!("not a readscope JSON report: {e}")))
}
