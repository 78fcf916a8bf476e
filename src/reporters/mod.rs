//! Report rendering
//!
//! Built-in templates:
//! - `text` - Terminal summary with styled bands
//! - `json` - Full report as JSON, parseable back with [`json::parse`]
//! - `markdown` / `md` - GitHub-flavored Markdown tables
//! - `html` - Standalone HTML page
//! - `csv` - One row per record or failure
//!
//! Anything else is looked up as `<name>.tmpl` in the configured template
//! directory (see [`custom`]).

pub mod custom;
mod csv;
mod html;
pub mod json;
mod markdown;
mod text;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{ReadscopeError, Result};
use crate::models::{Report, RunState};

/// Turns a report into text.
pub trait Template: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, report: &Report) -> Result<String>;

    /// Suggested extension for files written with this template.
    fn extension(&self) -> &str {
        "txt"
    }
}

/// Template lookup by name.
pub struct TemplateRegistry {
    templates: BTreeMap<String, Box<dyn Template>>,
    aliases: BTreeMap<&'static str, &'static str>,
    template_dir: Option<PathBuf>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    /// Registry with the built-in templates.
    pub fn builtin() -> Self {
        let mut registry = Self {
            templates: BTreeMap::new(),
            aliases: BTreeMap::from([("md", "markdown"), ("txt", "text")]),
            template_dir: None,
        };
        registry.register(Box::new(text::TextTemplate));
        registry.register(Box::new(json::JsonTemplate));
        registry.register(Box::new(markdown::MarkdownTemplate));
        registry.register(Box::new(html::HtmlTemplate));
        registry.register(Box::new(csv::CsvTemplate));
        registry
    }

    /// Also look up `<name>.tmpl` files in `dir`.
    pub fn with_template_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.template_dir = dir;
        self
    }

    pub fn register(&mut self, template: Box<dyn Template>) {
        self.templates.insert(template.name().to_string(), template);
    }

    /// Names of every template that can currently be rendered.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        if let Some(dir) = &self.template_dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some(custom::EXTENSION) {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            names.push(stem.to_string());
                        }
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// Find a template; custom templates are parsed and validated here.
    pub fn lookup(&self, name: &str) -> Result<Resolved<'_>> {
        let lowered = name.to_lowercase();
        let canonical = self
            .aliases
            .get(lowered.as_str())
            .copied()
            .unwrap_or(lowered.as_str());
        if let Some(template) = self.templates.get(canonical) {
            return Ok(Resolved::Builtin(template.as_ref()));
        }

        if let Some(dir) = &self.template_dir {
            let path = dir.join(format!("{name}.{}", custom::EXTENSION));
            if path.is_file() {
                debug!("Using custom template {}", path.display());
                return Ok(Resolved::Custom(custom::CustomTemplate::load(&path)?));
            }
        }

        Err(ReadscopeError::template(format!(
            "template '{name}' not found (available: {})",
            self.names().join(", ")
        )))
    }

    /// Render `report` with the named template and mark it `RENDERED`.
    ///
    /// An unknown template leaves the report untouched.
    pub fn render(&self, report: &mut Report, name: &str) -> Result<String> {
        let template = self.lookup(name)?;
        let previous = report.state;
        if previous.can_advance_to(RunState::Rendered) {
            report.state = RunState::Rendered;
        }
        match template.get().render(report) {
            Ok(text) => Ok(text),
            Err(e) => {
                report.state = previous;
                Err(e)
            }
        }
    }
}

/// A template found by [`TemplateRegistry::lookup`].
pub enum Resolved<'a> {
    Builtin(&'a dyn Template),
    Custom(custom::CustomTemplate),
}

impl Resolved<'_> {
    pub fn get(&self) -> &dyn Template {
        match self {
            Resolved::Builtin(t) => *t,
            Resolved::Custom(t) => t,
        }
    }
}

/// Format an optional score for display.
pub(crate) fn fmt_score(score: Option<f64>) -> String {
    score.map(|s| format!("{s:.3}")).unwrap_or_else(|| "-".to_string())
}

/// Format an optional signed delta for display.
pub(crate) fn fmt_delta(delta: Option<f64>) -> String {
    delta
        .map(|d| format!("{d:+.3}"))
        .unwrap_or_else(|| "-".to_string())
}
