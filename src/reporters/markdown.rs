//! Markdown reporter for GitHub-flavored Markdown output
//!
//! Suitable for pull request comments and wiki pages.

use super::{fmt_delta, fmt_score, Template};
use crate::error::Result;
use crate::models::{short_id, FileTrend, RatingBand, Report};

/// Maximum failures listed before truncating
const MAX_FAILURES: usize = 20;

pub struct MarkdownTemplate;

impl Template for MarkdownTemplate {
    fn name(&self) -> &str {
        "markdown"
    }

    fn render(&self, report: &Report) -> Result<String> {
        Ok(render(report))
    }

    fn extension(&self) -> &str {
        "md"
    }
}

/// Render report as GitHub-flavored Markdown
pub fn render(report: &Report) -> String {
    let mut md = String::new();

    md.push_str(&render_header(report));
    md.push('\n');
    md.push_str(&render_summary(report));
    md.push('\n');
    md.push_str(&render_revisions(report));
    md.push_str(&render_files(&report.files));
    md.push_str(&render_failures(report));
    md.push_str(&render_footer(report));

    md
}

fn band_emoji(band: RatingBand) -> &'static str {
    match band {
        RatingBand::High => "🟢",
        RatingBand::Medium => "🟡",
        RatingBand::Low => "🔴",
    }
}

/// Markdown table cells cannot contain raw pipes.
fn cell(s: &str) -> String {
    s.replace('|', "\\|")
}

fn render_header(report: &Report) -> String {
    let partial = if report.partial {
        "\n> ⚠️ The run was cancelled before the walk finished; results are partial.\n"
    } else {
        ""
    };
    format!(
        r#"# Readability Report

**Repository:** `{}` | **Range:** `{}` | **Revisions walked:** {}
{}"#,
        report.repository, report.range, report.revisions_walked, partial
    )
}

fn render_summary(report: &Report) -> String {
    let s = &report.summary;
    let trend = s
        .trend_per_day
        .map(|t| format!("{t:+.4} / day"))
        .unwrap_or_else(|| "-".to_string());

    format!(
        r#"## Summary

| Metric | Value |
|--------|-------|
| **Units scored** | {} |
| **Failures** | {} |
| **Mean** | {} |
| **Median** | {} |
| **Min / Max** | {} / {} |
| **Trend** | {} |
| **Bands** | {} {} · {} {} · {} {} |
"#,
        s.count,
        s.failures,
        fmt_score(s.mean),
        fmt_score(s.median),
        fmt_score(s.min),
        fmt_score(s.max),
        trend,
        band_emoji(RatingBand::High),
        s.bands.high,
        band_emoji(RatingBand::Medium),
        s.bands.medium,
        band_emoji(RatingBand::Low),
        s.bands.low,
    )
}

fn render_revisions(report: &Report) -> String {
    if report.revisions.is_empty() {
        return String::new();
    }
    let mut md = String::from(
        "## Revisions\n\n| Revision | Date | Units | Mean | Delta |\n|----------|------|-------|------|-------|\n",
    );
    for rev in &report.revisions {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            short_id(&rev.revision),
            rev.timestamp.format("%Y-%m-%d"),
            rev.units,
            fmt_score(Some(rev.mean)),
            fmt_delta(rev.delta)
        ));
    }
    md.push('\n');
    md
}

fn render_files(files: &[FileTrend]) -> String {
    if files.is_empty() {
        return String::new();
    }
    let mut md = String::from(
        "## Files\n\n| Unit | Samples | First | Last | Delta |\n|------|---------|-------|------|-------|\n",
    );
    for file in files {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            cell(&file.path),
            file.samples,
            fmt_score(Some(file.first_score)),
            fmt_score(Some(file.last_score)),
            fmt_delta(Some(file.delta))
        ));
    }
    md.push('\n');
    md
}

fn render_failures(report: &Report) -> String {
    if report.failures.is_empty() {
        return String::new();
    }
    let mut md = format!("## Warnings ({})\n\n", report.failures.len());
    for failure in report.failures.iter().take(MAX_FAILURES) {
        md.push_str(&format!("- `{}`: {}\n", failure.unit, failure.error));
    }
    if report.failures.len() > MAX_FAILURES {
        md.push_str(&format!(
            "\n*...and {} more*\n",
            report.failures.len() - MAX_FAILURES
        ));
    }
    md.push('\n');
    md
}

fn render_footer(report: &Report) -> String {
    format!(
        "---\n\n*Model `{}` v{} ({}) · run `{}` · generated {}*\n",
        report.model.schema,
        report.model.version,
        report.model.link,
        report.run_id,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
