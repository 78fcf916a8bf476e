//! `readscope hints`: ranked improvements per function

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use super::file::WORKTREE;
use super::output::ExitStatus;
use super::settings::{Flags, Settings};
use crate::features::{FeatureExtractor, FEATURE_NAMES, SCHEMA};
use crate::model::{improvements, Model};
use crate::models::{FeatureVector, SourceUnit, UnitId};

pub(super) fn run(file: &Path, top: usize, flags: Flags) -> Result<ExitStatus> {
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    let (settings, _) = Settings::load(flags, &cwd)?;
    let model = settings.sources.resolve()?;
    model.check_schema(SCHEMA, &FEATURE_NAMES)?;

    let content =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let unit = SourceUnit::new(
        UnitId::new(file.to_string_lossy(), WORKTREE),
        content,
    );
    print!("{}", render(&model, &unit, top)?);
    Ok(ExitStatus::Success)
}

/// Hints for every function, or for the whole file when it has none.
fn render(model: &Model, unit: &SourceUnit, top: usize) -> Result<String> {
    let extractor = FeatureExtractor::new();
    let path = &unit.id().path;
    let mut targets: Vec<(String, FeatureVector)> = extractor
        .extract_scopes(unit)
        .with_context(|| format!("cannot analyze {path}"))?
        .into_iter()
        .map(|s| {
            (
                format!("{} (L{}-{})", s.span.name, s.span.start_line, s.span.end_line),
                s.features,
            )
        })
        .collect();
    if targets.is_empty() {
        let features = extractor
            .extract(unit)
            .with_context(|| format!("cannot analyze {path}"))?;
        targets.push((path.clone(), features));
    }

    let mut out = String::new();
    for (label, features) in targets {
        let score = model.score(&features)?;
        let _ = writeln!(
            out,
            "{}  {} {}",
            style(format!("{score:.3}")).bold(),
            label,
            style(format!("[{}]", model.band(score))).dim()
        );
        let hints = improvements(model, &features)?;
        if hints.is_empty() {
            let _ = writeln!(out, "    no improvements found");
        }
        for hint in hints.iter().take(top) {
            let _ = writeln!(
                out,
                "    {}. {}  {}",
                hint.rank,
                hint.advice(),
                style(format!("+{:.3}", hint.gain())).green()
            );
        }
    }
    Ok(out)
}
