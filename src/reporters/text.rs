//! Text (terminal) reporter with colors and formatting

use console::{style, StyledObject};

use super::{fmt_delta, fmt_score, Template};
use crate::error::Result;
use crate::models::{short_id, RatingBand, Report};

/// Maximum rows shown in the per-file and per-revision tables
const MAX_ROWS: usize = 15;

pub struct TextTemplate;

impl Template for TextTemplate {
    fn name(&self) -> &str {
        "text"
    }

    fn render(&self, report: &Report) -> Result<String> {
        Ok(render(report))
    }
}

fn band_style(band: RatingBand, text: String) -> StyledObject<String> {
    match band {
        RatingBand::Low => style(text).red(),
        RatingBand::Medium => style(text).yellow(),
        RatingBand::High => style(text).green(),
    }
}

/// Render report as formatted terminal output
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let s = &report.summary;

    out.push_str(&format!("\n{}\n", style("Readability Report").bold()));
    out.push_str(&format!(
        "{}\n",
        style("──────────────────────────────────────").dim()
    ));
    out.push_str(&format!(
        "Repository: {}  Range: {}  Revisions: {}\n",
        report.repository, report.range, report.revisions_walked
    ));
    out.push_str(&format!(
        "Model: {} v{} ({}) from {}\n\n",
        report.model.schema, report.model.version, report.model.link, report.model.source
    ));

    out.push_str(&format!("{}\n", style("SUMMARY").bold()));
    out.push_str(&format!(
        "  Scored: {}  Failed: {}  Mean: {}  Median: {}  Min: {}  Max: {}\n",
        s.count,
        s.failures,
        fmt_score(s.mean),
        fmt_score(s.median),
        fmt_score(s.min),
        fmt_score(s.max)
    ));
    out.push_str(&format!(
        "  Bands: {} {} {}",
        band_style(RatingBand::High, format!("high {}", s.bands.high)),
        band_style(RatingBand::Medium, format!("medium {}", s.bands.medium)),
        band_style(RatingBand::Low, format!("low {}", s.bands.low)),
    ));
    if let Some(slope) = s.trend_per_day {
        out.push_str(&format!("  Trend: {slope:+.4}/day"));
    }
    out.push_str("\n\n");

    if !report.revisions.is_empty() {
        out.push_str(&format!("{}\n", style("REVISIONS").bold()));
        for rev in report.revisions.iter().take(MAX_ROWS) {
            out.push_str(&format!(
                "  {}  {}  units {:>4}  mean {}  {}\n",
                style(short_id(&rev.revision)).cyan(),
                rev.timestamp.format("%Y-%m-%d"),
                rev.units,
                fmt_score(Some(rev.mean)),
                style(fmt_delta(rev.delta)).dim()
            ));
        }
        if report.revisions.len() > MAX_ROWS {
            out.push_str(&format!(
                "  {}\n",
                style(format!("... {} more", report.revisions.len() - MAX_ROWS)).dim()
            ));
        }
        out.push('\n');
    }

    if !report.files.is_empty() {
        out.push_str(&format!("{}\n", style("FILES").bold()));
        let mut files: Vec<_> = report.files.iter().collect();
        files.sort_by(|a, b| a.last_score.total_cmp(&b.last_score));
        for file in files.iter().take(MAX_ROWS) {
            out.push_str(&format!(
                "  {}  {}  {}\n",
                fmt_score(Some(file.last_score)),
                style(fmt_delta(Some(file.delta))).dim(),
                file.path
            ));
        }
        out.push('\n');
    }

    if !report.failures.is_empty() {
        out.push_str(&format!(
            "{} ({})\n",
            style("WARNINGS").bold().yellow(),
            report.failures.len()
        ));
        for failure in report.failures.iter().take(MAX_ROWS) {
            out.push_str(&format!("  {}  {}\n", failure.unit, style(&failure.error).dim()));
        }
        out.push('\n');
    }

    if report.partial {
        out.push_str(&format!(
            "{}\n",
            style("Run was cancelled; results are partial.").yellow()
        ));
    }

    out
}
