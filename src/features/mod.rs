//! Readability feature extraction
//!
//! Turns a [`SourceUnit`] into a fixed-shape [`FeatureVector`] following the
//! `readscope.features.v1` schema. Features are lexical and structural
//! (line lengths, identifier statistics, nesting depth, comment density) in
//! the tradition of the Buse-Weimer and Posnett readability models.
//!
//! Feature groups, in order:
//!   0..8   line length, identifiers per line, identifier length, indentation
//!   8..20  per-line token counts (keywords, numbers, punctuation, operators)
//!  20..22  block nesting depth
//!  22..26  comment density, blank lines, Halstead volume, size
//!
//! "Per line" always means per non-blank line of the unit. Extraction is
//! pure: the same text always produces a bit-identical vector.

mod scopes;
mod syntax;

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::UnitError;
use crate::models::{FeatureVector, ScopeSpan, SourceUnit};
use syntax::{Token, TokenClass};

/// Identifier of the feature schema produced by this extractor.
pub const SCHEMA: &str = "readscope.features.v1";

/// Number of features produced by the extractor.
pub const NUM_FEATURES: usize = 26;

/// Feature names, in extraction order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "line_length_avg",
    "line_length_max",
    "identifiers_avg",
    "identifiers_max",
    "identifier_length_avg",
    "identifier_length_max",
    "indentation_avg",
    "indentation_max",
    "keywords_avg",
    "keywords_max",
    "numbers_avg",
    "numbers_max",
    "parentheses_avg",
    "periods_avg",
    "commas_avg",
    "spaces_avg",
    "comparisons_avg",
    "assignments_avg",
    "branches_avg",
    "loops_avg",
    "nesting_depth_avg",
    "nesting_depth_max",
    "comment_density",
    "blank_line_ratio",
    "halstead_volume",
    "code_lines_log",
];

/// Tab stop used when measuring indentation.
const TAB_WIDTH: usize = 4;

const COMPARISONS: &[&str] = &["==", "!=", "===", "!==", "<", ">", "<=", ">=", "<>"];

const ASSIGNMENTS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", ">>>=", ":=", "**=",
    "//=", "??=", "&&=", "||=",
];

const BRANCH_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "switch", "case", "match", "catch", "except", "select", "?",
];

const LOOP_KEYWORDS: &[&str] = &["for", "while", "do", "loop", "foreach"];

/// A function-level unit and its features.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedFeatures {
    pub span: ScopeSpan,
    pub features: FeatureVector,
}

/// Stateless extractor. Cheap to share across worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Schema identifier for vectors produced by this extractor.
    pub fn schema(&self) -> &'static str {
        SCHEMA
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    /// Extract the feature vector of a whole unit.
    pub fn extract(&self, unit: &SourceUnit) -> Result<FeatureVector, UnitError> {
        let (text, language) = prepare(unit)?;
        let tree = syntax::parse(text, language)?;
        let root = tree.root_node();
        let lines: Vec<&str> = split_lines(text);
        compute(&root, &lines, 0, lines.len().saturating_sub(1), text)
    }

    /// Extract one feature vector per function or method in the unit.
    ///
    /// Units without any function-like scope yield an empty list.
    pub fn extract_scopes(&self, unit: &SourceUnit) -> Result<Vec<ScopedFeatures>, UnitError> {
        let (text, language) = prepare(unit)?;
        let tree = syntax::parse(text, language)?;
        let root = tree.root_node();
        let lines: Vec<&str> = split_lines(text);

        scopes::find_scopes(&root, text, language)
            .into_iter()
            .map(|scope| {
                let first = scope.node.start_position().row;
                let last = scope.node.end_position().row.min(lines.len().saturating_sub(1));
                let features = compute(&scope.node, &lines, first, last, text)?;
                Ok(ScopedFeatures {
                    span: scope.span,
                    features,
                })
            })
            .collect()
    }
}

fn prepare(unit: &SourceUnit) -> Result<(&str, crate::models::Language), UnitError> {
    let language = unit.language().ok_or_else(|| {
        UnitError::Parse(format!("unsupported language for {}", unit.id().path))
    })?;
    let text = unit.text()?;
    if text.trim().is_empty() {
        return Err(UnitError::Parse("unit contains no code".into()));
    }
    Ok((text, language))
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

/// Per-line counters, indexed relative to the first line of the region.
#[derive(Debug, Default, Clone)]
struct LineStats {
    identifiers: usize,
    keywords: usize,
    numbers: usize,
    parentheses: usize,
    periods: usize,
    commas: usize,
    comparisons: usize,
    assignments: usize,
    branches: usize,
    loops: usize,
    depth: Option<usize>,
    comment: bool,
}

/// Compute the feature vector for the node `root` spanning rows `first..=last`.
fn compute(
    root: &Node,
    lines: &[&str],
    first: usize,
    last: usize,
    text: &str,
) -> Result<FeatureVector, UnitError> {
    let last = last.clamp(first, lines.len().saturating_sub(1));
    let region = lines.get(first..=last).unwrap_or(&[]);
    let mut stats = vec![LineStats::default(); region.len()];

    let tokens = syntax::tokens(root, text);
    let mut identifier_lengths = Vec::new();
    let mut operators: Vec<&str> = Vec::new();
    let mut operands: Vec<&str> = Vec::new();

    for token in &tokens {
        let Some(row) = token.start_row.checked_sub(first) else {
            continue;
        };
        if row >= stats.len() {
            continue;
        }
        let line = &mut stats[row];
        if line.depth.is_none() {
            line.depth = Some(token.depth);
        }
        tally(token, line, &mut identifier_lengths, &mut operators, &mut operands);

        if token.class == TokenClass::Comment {
            let end = token.last_row().saturating_sub(first).min(stats.len() - 1);
            for s in &mut stats[row..=end] {
                s.comment = true;
            }
        }
    }

    let base_indent = region
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indentation(l))
        .min()
        .unwrap_or(0);

    let mut code = Vec::new();
    for (i, line) in region.iter().enumerate() {
        if !line.trim().is_empty() {
            code.push((i, *line));
        }
    }
    if code.is_empty() {
        return Err(UnitError::Parse("unit contains no code".into()));
    }

    let n = code.len() as f64;
    let per_line = |f: fn(&LineStats) -> usize| per_line_stats(&stats, &code, f);

    let lengths: Vec<usize> = code
        .iter()
        .map(|(_, l)| {
            let trimmed = l.trim_end();
            let indent = indentation(trimmed).saturating_sub(base_indent);
            indent + trimmed.trim_start().chars().count()
        })
        .collect();
    let indents: Vec<usize> = code
        .iter()
        .map(|(_, l)| indentation(l).saturating_sub(base_indent))
        .collect();
    let spaces_sum: usize = code.iter().map(|(_, l)| inner_spaces(l)).sum();

    let (identifiers_avg, identifiers_max) = per_line(|s| s.identifiers);
    let (keywords_avg, keywords_max) = per_line(|s| s.keywords);
    let (numbers_avg, numbers_max) = per_line(|s| s.numbers);
    let (parentheses_avg, _) = per_line(|s| s.parentheses);
    let (periods_avg, _) = per_line(|s| s.periods);
    let (commas_avg, _) = per_line(|s| s.commas);
    let (comparisons_avg, _) = per_line(|s| s.comparisons);
    let (assignments_avg, _) = per_line(|s| s.assignments);
    let (branches_avg, _) = per_line(|s| s.branches);
    let (loops_avg, _) = per_line(|s| s.loops);

    let depths: Vec<usize> = code.iter().filter_map(|(i, _)| stats[*i].depth).collect();
    let (depth_avg, depth_max) = if depths.is_empty() {
        (0.0, 0.0)
    } else {
        (
            depths.iter().sum::<usize>() as f64 / depths.len() as f64,
            *depths.iter().max().unwrap_or(&0) as f64,
        )
    };

    let comment_lines = code.iter().filter(|(i, _)| stats[*i].comment).count();
    let blank_lines = region.len() - code.len();

    let values = vec![
        mean(&lengths),
        max(&lengths),
        identifiers_avg,
        identifiers_max,
        mean(&identifier_lengths),
        max(&identifier_lengths),
        mean(&indents),
        max(&indents),
        keywords_avg,
        keywords_max,
        numbers_avg,
        numbers_max,
        parentheses_avg,
        periods_avg,
        commas_avg,
        spaces_sum as f64 / n,
        comparisons_avg,
        assignments_avg,
        branches_avg,
        loops_avg,
        depth_avg,
        depth_max,
        comment_lines as f64 / n,
        blank_lines as f64 / region.len() as f64,
        halstead_volume(&operators, &operands),
        (1.0 + n).ln(),
    ];
    debug_assert_eq!(values.len(), NUM_FEATURES);

    Ok(FeatureVector {
        schema: SCHEMA.to_string(),
        names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        values,
    })
}

/// Mean and maximum of a per-line counter over the code lines.
fn per_line_stats(
    stats: &[LineStats],
    code: &[(usize, &str)],
    f: fn(&LineStats) -> usize,
) -> (f64, f64) {
    let mut sum = 0usize;
    let mut max = 0usize;
    for (i, _) in code {
        let v = f(&stats[*i]);
        sum += v;
        max = max.max(v);
    }
    (sum as f64 / code.len() as f64, max as f64)
}

fn tally<'a>(
    token: &Token<'a>,
    line: &mut LineStats,
    identifier_lengths: &mut Vec<usize>,
    operators: &mut Vec<&'a str>,
    operands: &mut Vec<&'a str>,
) {
    match token.class {
        TokenClass::Comment => {}
        TokenClass::StringLit => operands.push(token.text),
        TokenClass::Number => {
            line.numbers += 1;
            operands.push(token.text);
        }
        TokenClass::Identifier => {
            line.identifiers += 1;
            identifier_lengths.push(token.text.chars().count());
            operands.push(token.text);
        }
        TokenClass::Keyword => {
            line.keywords += 1;
            if BRANCH_KEYWORDS.contains(&token.text) {
                line.branches += 1;
            }
            if LOOP_KEYWORDS.contains(&token.text) {
                line.loops += 1;
            }
            operators.push(token.text);
        }
        TokenClass::Symbol => {
            let t = token.text;
            match t {
                "(" => line.parentheses += 1,
                "." | "?." => line.periods += 1,
                "," => line.commas += 1,
                "?" => line.branches += 1,
                _ => {}
            }
            if COMPARISONS.contains(&t) && !is_type_context(token.parent_kind) {
                line.comparisons += 1;
            }
            if ASSIGNMENTS.contains(&t) {
                line.assignments += 1;
            }
            operators.push(t);
        }
    }
}

/// `<` and `>` inside generic argument lists are brackets, not comparisons.
fn is_type_context(parent_kind: &str) -> bool {
    parent_kind.contains("type") || parent_kind.contains("generic")
}

/// Leading whitespace width with tabs expanded.
fn indentation(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH - (width % TAB_WIDTH),
            _ => break,
        }
    }
    width
}

/// Whitespace characters between the first and last visible characters.
fn inner_spaces(line: &str) -> usize {
    line.trim()
        .chars()
        .filter(|c| *c == ' ' || *c == '\t')
        .count()
}

/// Halstead volume `N * log2(n)` (Posnett et al.).
fn halstead_volume(operators: &[&str], operands: &[&str]) -> f64 {
    let total = operators.len() + operands.len();
    let distinct: HashSet<&str> = operators.iter().chain(operands.iter()).copied().collect();
    if distinct.len() < 2 {
        return 0.0;
    }
    total as f64 * (distinct.len() as f64).log2()
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<usize>() as f64 / values.len() as f64
    }
}

fn max(values: &[usize]) -> f64 {
    values.iter().copied().max().unwrap_or(0) as f64
}
