//! User-defined templates
//!
//! A `<name>.tmpl` file is plain text with two kinds of tags:
//!
//! - `{{ field.path }}` inserts a value from the report
//! - `{{#records}} ... {{/records}}` repeats its body once per element of a
//!   list (`records`, `failures`, `files`, `revisions`). Inside the body,
//!   fields resolve against the element first, then against the report.
//!
//! Templates are checked against the report's field layout when loaded, so a
//! typo in a field name fails before any output is produced.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use super::Template;
use crate::error::{ReadscopeError, Result, UnitError};
use crate::models::{
    FeatureVector, FileTrend, Language, ModelInfo, RatingBand, Report, RevisionSummary, RunState,
    ScopeSpan, ScoreRecord, Summary, UnitFailure, UnitId,
};

/// File extension of custom templates.
pub const EXTENSION: &str = "tmpl";

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"\{\{\s*([#/]?)\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}")
            .expect("valid regex")
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field(String),
    Section { name: String, body: Vec<Node> },
}

/// A parsed and validated custom template.
#[derive(Debug, Clone)]
pub struct CustomTemplate {
    name: String,
    nodes: Vec<Node>,
}

impl CustomTemplate {
    /// Read, parse and validate a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ReadscopeError::template(format!("cannot read {}: {e}", path.display()))
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom")
            .to_string();
        Self::parse(&name, &source)
    }

    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let nodes = parse_nodes(source)
            .map_err(|e| ReadscopeError::template(format!("{name}.{EXTENSION}: {e}")))?;
        let skeleton = schema_skeleton();
        validate(&nodes, &mut vec![&skeleton])
            .map_err(|e| ReadscopeError::template(format!("{name}.{EXTENSION}: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }
}

impl Template for CustomTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, report: &Report) -> Result<String> {
        let root = serde_json::to_value(report)
            .map_err(|e| ReadscopeError::template(format!("cannot serialize report: {e}")))?;
        let mut out = String::new();
        render_nodes(&self.nodes, &mut vec![&root], &mut out);
        Ok(out)
    }
}

fn parse_nodes(source: &str) -> std::result::Result<Vec<Node>, String> {
    // (section name, nodes collected so far); the root frame has no name
    let mut stack: Vec<(Option<String>, Vec<Node>)> = vec![(None, Vec::new())];
    let mut cursor = 0;

    for caps in tag_pattern().captures_iter(source) {
        let (Some(whole), Some(sigil), Some(path)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let frame = stack.len() - 1;
        if whole.start() > cursor {
            stack[frame]
                .1
                .push(Node::Text(source[cursor..whole.start()].to_string()));
        }
        cursor = whole.end();

        let path = path.as_str().to_string();
        match sigil.as_str() {
            "#" => stack.push((Some(path), Vec::new())),
            "/" => {
                let (open, body) = match stack.pop() {
                    Some((Some(open), body)) => (open, body),
                    _ => return Err(format!("'{{{{/{path}}}}}' closes a section that was never opened")),
                };
                if open != path {
                    return Err(format!(
                        "section '{open}' closed by '{{{{/{path}}}}}'"
                    ));
                }
                let frame = stack.len() - 1;
                stack[frame].1.push(Node::Section { name: open, body });
            }
            _ => stack[frame].1.push(Node::Field(path)),
        }
    }

    if let Some((Some(open), _)) = stack.last() {
        return Err(format!("section '{open}' is never closed"));
    }
    let mut nodes = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();
    if cursor < source.len() {
        nodes.push(Node::Text(source[cursor..].to_string()));
    }
    Ok(nodes)
}

/// Resolve `path` against the innermost context that has its first segment.
fn lookup<'v>(contexts: &[&'v Value], path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let head = segments.next()?;
    let mut value = contexts.iter().rev().find_map(|ctx| ctx.get(head))?;
    for segment in segments {
        value = value.get(segment)?;
    }
    Some(value)
}

fn validate<'v>(nodes: &[Node], contexts: &mut Vec<&'v Value>) -> std::result::Result<(), String> {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Field(path) => {
                if lookup(contexts, path).is_none() {
                    return Err(format!("unknown field '{path}'"));
                }
            }
            Node::Section { name, body } => {
                let value = lookup(contexts, name).ok_or_else(|| format!("unknown section '{name}'"))?;
                let inner = match value {
                    Value::Array(items) => items.first(),
                    Value::Object(_) => Some(value),
                    _ => None,
                };
                match inner {
                    Some(inner) => {
                        contexts.push(inner);
                        let result = validate(body, contexts);
                        contexts.pop();
                        result?;
                    }
                    None => validate(body, contexts)?,
                }
            }
        }
    }
    Ok(())
}

fn render_nodes<'v>(nodes: &[Node], contexts: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(path) => {
                if let Some(value) = lookup(contexts, path) {
                    out.push_str(&display(value));
                }
            }
            Node::Section { name, body } => match lookup(contexts, name) {
                Some(Value::Array(items)) => {
                    for item in items {
                        contexts.push(item);
                        render_nodes(body, contexts, out);
                        contexts.pop();
                    }
                }
                Some(object @ Value::Object(_)) => {
                    contexts.push(object);
                    render_nodes(body, contexts, out);
                    contexts.pop();
                }
                Some(Value::Bool(true)) => render_nodes(body, contexts, out),
                Some(Value::String(s)) if !s.is_empty() => render_nodes(body, contexts, out),
                Some(Value::Number(_)) => render_nodes(body, contexts, out),
                _ => {}
            },
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
            (Some(u), _, _) => u.to_string(),
            (None, Some(i), _) => i.to_string(),
            (None, None, Some(f)) => format!("{f:.4}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A report with every optional field present and one element per list.
fn schema_skeleton() -> Value {
    let at = DateTime::<Utc>::default();
    let scope = ScopeSpan {
        name: String::new(),
        kind: String::new(),
        start_line: 1,
        end_line: 1,
    };
    let unit = UnitId::new("", "").with_scope(scope);
    let report = Report {
        run_id: String::new(),
        generated_at: at,
        repository: String::new(),
        range: String::new(),
        model: ModelInfo::default(),
        state: RunState::Aggregating,
        partial: false,
        revisions_walked: 0,
        records: vec![ScoreRecord {
            unit: unit.clone(),
            language: Language::Rust,
            features: FeatureVector {
                schema: String::new(),
                names: vec![String::new()],
                values: vec![0.0],
            },
            score: 0.0,
            band: RatingBand::Medium,
            timestamp: at,
        }],
        failures: vec![UnitFailure {
            unit,
            error: UnitError::Parse(String::new()),
        }],
        summary: Summary {
            mean: Some(0.0),
            median: Some(0.0),
            min: Some(0.0),
            max: Some(0.0),
            trend_per_day: Some(0.0),
            ..Summary::default()
        },
        files: vec![FileTrend {
            path: String::new(),
            samples: 0,
            first_score: 0.0,
            last_score: 0.0,
            delta: 0.0,
        }],
        revisions: vec![RevisionSummary {
            revision: String::new(),
            timestamp: at,
            units: 0,
            mean: 0.0,
            delta: Some(0.0),
        }],
    };
    serde_json::to_value(report).unwrap_or(Value::Null)
}
