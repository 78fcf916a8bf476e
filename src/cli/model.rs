//! `readscope model`: inspect or validate a model

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use super::output::ExitStatus;
use super::settings::{Flags, Settings};
use crate::features::{FEATURE_NAMES, SCHEMA};
use crate::model::Model;

pub(super) fn run(check: Option<&Path>, flags: Flags) -> Result<ExitStatus> {
    let model = match check {
        Some(path) => Model::load(path)?,
        None => {
            let cwd = std::env::current_dir().context("cannot determine the current directory")?;
            let (settings, _) = Settings::load(flags, &cwd)?;
            settings.sources.resolve()?
        }
    };
    model
        .check_schema(SCHEMA, &FEATURE_NAMES)
        .context("model does not match this version of readscope")?;

    if check.is_some() {
        println!(
            "{} {} ({} features, schema {})",
            style("OK").green().bold(),
            model.source(),
            model.features.len(),
            model.schema
        );
    } else {
        print!("{}", describe(&model));
    }
    Ok(ExitStatus::Success)
}

fn describe(model: &Model) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Model").bold());
    let _ = writeln!(out, "  source:    {}", model.source());
    let _ = writeln!(out, "  format:    {} v{}", model.format, model.version);
    let _ = writeln!(out, "  schema:    {}", model.schema);
    let _ = writeln!(out, "  link:      {}", model.link);
    let _ = writeln!(out, "  intercept: {}", model.intercept);
    let _ = writeln!(out, "  range:     {} .. {}", model.range.min, model.range.max);
    let _ = writeln!(out, "  bands:     low < {}  high > {}", model.bands.low, model.bands.high);
    let _ = writeln!(out, "\n{}", style("Features").bold());
    for feature in &model.features {
        let target = feature
            .target
            .map(|t| format!("target {t}"))
            .unwrap_or_default();
        let _ = writeln!(out, "  {:<24} {:>9.4}  {}", feature.name, feature.weight, target);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_lists_every_feature() {
        let model = Model::embedded_default().unwrap();
        let out = console::strip_ansi_codes(&describe(&model)).to_string();
        assert!(out.contains("source:    <embedded>"));
        assert!(out.contains(SCHEMA));
        for name in FEATURE_NAMES {
            assert!(out.contains(name), "{name}");
        }
    }
}
