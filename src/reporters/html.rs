//! HTML reporter with embedded styles
//!
//! Generates a standalone page that can be viewed in any browser.

use super::{fmt_delta, fmt_score, Template};
use crate::error::Result;
use crate::models::{RatingBand, Report};

pub struct HtmlTemplate;

impl Template for HtmlTemplate {
    fn name(&self) -> &str {
        "html"
    }

    fn render(&self, report: &Report) -> Result<String> {
        Ok(render(report))
    }

    fn extension(&self) -> &str {
        "html"
    }
}

/// Render report as standalone HTML
pub fn render(report: &Report) -> String {
    let mut html = String::new();

    html.push_str(&render_head(report));
    html.push_str("<body>\n<div class=\"container\">\n");
    html.push_str(&render_header(report));
    html.push_str("<div class=\"content\">\n");
    html.push_str(&render_summary(report));
    html.push_str(&render_records(report));
    html.push_str(&render_failures(report));
    html.push_str("</div>\n"); // content
    html.push_str("</div>\n</body>\n</html>\n");

    html
}

fn render_head(report: &Report) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Readability Report - {}</title>
    <style>
{CSS}
    </style>
</head>
"#,
        html_escape(&report.repository)
    )
}

fn render_header(report: &Report) -> String {
    let partial = if report.partial {
        "\n    <p class=\"partial\">Run cancelled: results are partial</p>"
    } else {
        ""
    };
    format!(
        r#"<div class="header">
    <h1>Readability Report</h1>
    <p class="timestamp">{} · {} · {} revisions</p>{}
</div>
"#,
        html_escape(&report.repository),
        html_escape(&report.range),
        report.revisions_walked,
        partial
    )
}

fn render_summary(report: &Report) -> String {
    let s = &report.summary;
    format!(
        r#"<h2>Summary</h2>
<table>
    <tr><th>Scored</th><td>{}</td></tr>
    <tr><th>Failures</th><td>{}</td></tr>
    <tr><th>Mean</th><td>{}</td></tr>
    <tr><th>Median</th><td>{}</td></tr>
    <tr><th>Min / Max</th><td>{} / {}</td></tr>
    <tr><th>Trend per day</th><td>{}</td></tr>
</table>
"#,
        s.count,
        s.failures,
        fmt_score(s.mean),
        fmt_score(s.median),
        fmt_score(s.min),
        fmt_score(s.max),
        fmt_delta(s.trend_per_day),
    )
}

fn band_class(band: RatingBand) -> &'static str {
    match band {
        RatingBand::High => "band-high",
        RatingBand::Medium => "band-medium",
        RatingBand::Low => "band-low",
    }
}

fn render_records(report: &Report) -> String {
    if report.records.is_empty() {
        return "<p>No units were scored.</p>\n".to_string();
    }
    let mut html = String::from(
        "<h2>Scores</h2>\n<table>\n    <tr><th>Revision</th><th>Unit</th><th>Language</th><th>Score</th></tr>\n",
    );
    for record in &report.records {
        let unit = match &record.unit.scope {
            Some(scope) => format!("{}::{}", record.unit.path, scope.name),
            None => record.unit.path.clone(),
        };
        html.push_str(&format!(
            "    <tr><td><code>{}</code></td><td>{}</td><td>{}</td><td class=\"{}\">{:.3}</td></tr>\n",
            html_escape(record.unit.short_revision()),
            html_escape(&unit),
            record.language,
            band_class(record.band),
            record.score
        ));
    }
    html.push_str("</table>\n");
    html
}

fn render_failures(report: &Report) -> String {
    if report.failures.is_empty() {
        return String::new();
    }
    let mut html = format!("<h2>Warnings ({})</h2>\n<ul>\n", report.failures.len());
    for failure in &report.failures {
        html.push_str(&format!(
            "    <li><code>{}</code> {}</li>\n",
            html_escape(&failure.unit.to_string()),
            html_escape(&failure.error.to_string())
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// Embedded CSS
const CSS: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    line-height: 1.6;
    color: #1e293b;
    background: #f8fafc;
    padding: 2rem;
}
.container { max-width: 1100px; margin: 0 auto; background: white; border-radius: 12px; overflow: hidden; }
.header { background: #334155; color: white; padding: 2rem; }
.header .partial { color: #fbbf24; }
.content { padding: 2rem; }
table { border-collapse: collapse; width: 100%; margin-bottom: 2rem; }
th, td { text-align: left; padding: 0.4rem 0.8rem; border-bottom: 1px solid #e2e8f0; }
.band-high { color: #16a34a; }
.band-medium { color: #ca8a04; }
.band-low { color: #dc2626; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_html_structure() {
        let html = render(&test_report());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("src/util.py::helper"));
        assert!(html.contains("class=\"band-low\""));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_html_escapes_content() {
        let mut report = test_report();
        report.repository = "<script>".into();
        let html = render(&report);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
