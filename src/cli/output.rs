//! Report output and exit status

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::error::ReadscopeError;
use crate::models::Report;
use crate::reporters::TemplateRegistry;

/// Process exit status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The run failed
    Failed,
    /// Completed with per-unit warnings, or cancelled with partial results
    Warnings,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failed => 1,
            ExitStatus::Warnings => 3,
        }
    }

    pub fn for_report(report: &Report) -> Self {
        if report.has_warnings() || report.partial {
            ExitStatus::Warnings
        } else {
            ExitStatus::Success
        }
    }
}

pub(super) fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .expect("valid template")
}

pub(super) fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(create_spinner_style());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

/// Render `report` and write it to `output` or stdout.
///
/// A template error falls back to the JSON report so the scores are not lost,
/// and the command still fails.
pub(super) fn emit(
    report: &mut Report,
    registry: &TemplateRegistry,
    template: &str,
    output: Option<&Path>,
) -> Result<ExitStatus> {
    let (text, status) = match registry.render(report, template) {
        Ok(text) => (text, ExitStatus::for_report(report)),
        Err(e @ ReadscopeError::Template(_)) => {
            warn!("{}; writing the JSON report instead", e);
            eprintln!("Error: {e}");
            (registry.render(report, "json")?, ExitStatus::Failed)
        }
        Err(e) => return Err(e.into()),
    };

    match output {
        Some(path) => {
            // styling is decided by the terminal, not by the sink
            let text = console::strip_ansi_codes(&text);
            std::fs::write(path, text.as_bytes())
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunState, ScoreRecord};

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failed.code(), 1);
        assert_eq!(ExitStatus::Warnings.code(), 3);
    }

    #[test]
    fn test_template_error_falls_back_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.out");
        let mut report = crate::reporters::tests::test_report();
        let records: Vec<ScoreRecord> = report.records.clone();

        let status =
            emit(&mut report, &TemplateRegistry::builtin(), "nope", Some(&out)).unwrap();
        assert_eq!(status, ExitStatus::Failed);
        assert_eq!(report.state, RunState::Rendered);

        let written = crate::reporters::json::parse(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written.records, records);
    }

    #[test]
    fn test_report_file_has_no_escape_codes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.txt");
        let mut report = crate::reporters::tests::test_report();

        let colors = console::colors_enabled();
        console::set_colors_enabled(true);
        let result = emit(&mut report, &TemplateRegistry::builtin(), "text", Some(&out));
        console::set_colors_enabled(colors);

        assert_eq!(result.unwrap(), ExitStatus::Warnings);
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("REVISIONS"), "{written}");
        assert!(!written.contains('\u{1b}'), "{written:?}");
    }

    #[test]
    fn test_warnings_status() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.txt");
        let mut report = crate::reporters::tests::test_report();
        let status = emit(&mut report, &TemplateRegistry::builtin(), "text", Some(&out)).unwrap();
        assert_eq!(status, ExitStatus::Warnings);

        let mut clean = crate::reporters::tests::test_report();
        clean.failures.clear();
        let status = emit(&mut clean, &TemplateRegistry::builtin(), "csv", Some(&out)).unwrap();
        assert_eq!(status, ExitStatus::Success);
    }
}
