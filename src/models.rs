//! Core data models for readscope
//!
//! These models are shared by the extractor, the evaluator, the history
//! walker and the reporters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::UnitError;

/// Languages with a bundled tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    Java,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    C,
    Cpp,
    CSharp,
}

impl Language {
    /// Detect the language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "java" => Some(Language::Java),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "go" => Some(Language::Go),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h++" => Some(Language::Cpp),
            "cs" => Some(Language::CSharp),
            _ => None,
        }
    }

    /// Detect the language of a repository-relative or filesystem path.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::from_extension(&e.to_ascii_lowercase()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "Rust",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
            Language::Go => "Go",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display length of shortened revision ids, in characters.
pub const SHORT_ID_LEN: usize = 12;

/// First [`SHORT_ID_LEN`] characters of a revision id.
pub fn short_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(id.len(), |(i, _)| i);
    &id[..end]
}

/// A function or method inside a file, 1-based inclusive line range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSpan {
    pub name: String,
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Identifies a source unit: path + revision, optionally narrowed to a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub path: String,
    pub revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeSpan>,
}

impl UnitId {
    pub fn new(path: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            revision: revision.into(),
            scope: None,
        }
    }

    pub fn with_scope(&self, scope: ScopeSpan) -> Self {
        Self {
            path: self.path.clone(),
            revision: self.revision.clone(),
            scope: Some(scope),
        }
    }

    /// Revision id shortened for display.
    pub fn short_revision(&self) -> &str {
        short_id(&self.revision)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.short_revision())?;
        if let Some(scope) = &self.scope {
            write!(f, "::{} (L{}-{})", scope.name, scope.start_line, scope.end_line)?;
        }
        Ok(())
    }
}

/// Raw content of one file at one revision. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    id: UnitId,
    content: Arc<[u8]>,
    language: Option<Language>,
}

impl SourceUnit {
    /// Build a unit, detecting the language from the path.
    pub fn new(id: UnitId, content: impl Into<Arc<[u8]>>) -> Self {
        let language = Language::from_path(&id.path);
        Self {
            id,
            content: content.into(),
            language,
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    /// Content as text, rejecting binary blobs.
    pub fn text(&self) -> Result<&str, UnitError> {
        if self.content.contains(&0) {
            return Err(UnitError::Parse("binary content (NUL byte)".into()));
        }
        std::str::from_utf8(&self.content)
            .map_err(|e| UnitError::Parse(format!("content is not valid UTF-8: {e}")))
    }
}

/// Ordered, named numeric features tagged with the schema that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema: String,
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Coarse readability band (the red / yellow / green gutter colours).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingBand {
    Low,
    Medium,
    High,
}

impl fmt::Display for RatingBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingBand::Low => write!(f, "low"),
            RatingBand::Medium => write!(f, "medium"),
            RatingBand::High => write!(f, "high"),
        }
    }
}

/// One successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub unit: UnitId,
    pub language: Language,
    pub features: FeatureVector,
    pub score: f64,
    pub band: RatingBand,
    /// Commit time of the revision (or file mtime for working-tree scoring).
    pub timestamp: DateTime<Utc>,
}

/// A unit that could not be scored, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub unit: UnitId,
    pub error: UnitError,
}

/// How a path changed in a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// A single committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Full commit hash
    pub id: String,
    pub parents: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    /// First line of the commit message
    pub summary: String,
    pub changes: Vec<FileChange>,
}

impl Revision {
    /// Paths that still exist after this revision (added, modified, renamed).
    pub fn changed_paths(&self) -> impl Iterator<Item = &str> {
        self.changes
            .iter()
            .filter(|c| c.kind != ChangeKind::Deleted)
            .map(|c| c.path.as_str())
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Per-run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Init,
    Walking,
    Scoring,
    Aggregating,
    Rendered,
    Failed,
}

impl RunState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Failed, _) | (Rendered, _) => false,
            (_, Failed) => true,
            (Init, Walking)
            | (Walking, Scoring)
            | (Scoring, Walking)
            | (Walking, Aggregating)
            | (Scoring, Aggregating)
            | (Aggregating, Rendered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Init => "INIT",
            RunState::Walking => "WALKING",
            RunState::Scoring => "SCORING",
            RunState::Aggregating => "AGGREGATING",
            RunState::Rendered => "RENDERED",
            RunState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Model metadata copied into a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelInfo {
    pub schema: String,
    pub version: u32,
    pub link: String,
    pub range_min: f64,
    pub range_max: f64,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BandCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Summary statistics over all records in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Summary {
    pub count: usize,
    pub failures: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Least-squares slope of score against time, in score units per day.
    pub trend_per_day: Option<f64>,
    pub bands: BandCounts,
}

/// Score of one path across the walked history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTrend {
    pub path: String,
    pub samples: usize,
    pub first_score: f64,
    pub last_score: f64,
    pub delta: f64,
}

/// Mean score of the units scored at one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionSummary {
    pub revision: String,
    pub timestamp: DateTime<Utc>,
    pub units: usize,
    pub mean: f64,
    /// Change against the previous revision (chronologically) that had scores.
    pub delta: Option<f64>,
}

/// Terminal artifact of a run, handed to rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub repository: String,
    pub range: String,
    pub model: ModelInfo,
    pub state: RunState,
    /// Set when the run was cancelled before the walk finished.
    pub partial: bool,
    pub revisions_walked: usize,
    pub records: Vec<ScoreRecord>,
    pub failures: Vec<UnitFailure>,
    pub summary: Summary,
    pub files: Vec<FileTrend>,
    pub revisions: Vec<RevisionSummary>,
}

impl Report {
    pub fn has_warnings(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path("src/main.rs"), Some(Language::Rust));
        assert_eq!(Language::from_path("a/B.JAVA"), Some(Language::Java));
        assert_eq!(Language::from_path("web/app.tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_path("README.md"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_unit_text_rejects_binary() {
        let unit = SourceUnit::new(UnitId::new("a.rs", "r1"), b"fn main() {\0}".to_vec());
        assert!(matches!(unit.text(), Err(UnitError::Parse(_))));

        let unit = SourceUnit::new(UnitId::new("a.rs", "r1"), vec![0xff, 0xfe, 0x41]);
        assert!(matches!(unit.text(), Err(UnitError::Parse(_))));

        let unit = SourceUnit::new(UnitId::new("a.rs", "r1"), b"fn main() {}".to_vec());
        assert_eq!(unit.text().unwrap(), "fn main() {}");
    }

    #[test]
    fn test_short_id_respects_char_boundaries() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("ab-éééééééééé"), "ab-ééééééééé");
        assert_eq!(UnitId::new("a.rs", "ab-éééééééééé").short_revision(), "ab-ééééééééé");
    }

    #[test]
    fn test_unit_id_display() {
        let id = UnitId::new("src/lib.rs", "0123456789abcdef0123");
        assert_eq!(id.to_string(), "src/lib.rs@0123456789ab");

        let scoped = id.with_scope(ScopeSpan {
            name: "parse".into(),
            kind: "function_item".into(),
            start_line: 3,
            end_line: 9,
        });
        assert_eq!(scoped.to_string(), "src/lib.rs@0123456789ab::parse (L3-9)");
    }

    #[test]
    fn test_run_state_transitions() {
        use RunState::*;
        assert!(Init.can_advance_to(Walking));
        assert!(Walking.can_advance_to(Scoring));
        assert!(Scoring.can_advance_to(Walking));
        assert!(Scoring.can_advance_to(Aggregating));
        assert!(Aggregating.can_advance_to(Rendered));
        assert!(Init.can_advance_to(Failed));
        assert!(Scoring.can_advance_to(Failed));

        assert!(!Init.can_advance_to(Rendered));
        assert!(!Rendered.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Walking));
    }

    #[test]
    fn test_changed_paths_skip_deletions() {
        let rev = Revision {
            id: "abc".into(),
            parents: vec![],
            timestamp: Utc::now(),
            author: "a".into(),
            summary: "s".into(),
            changes: vec![
                FileChange {
                    path: "keep.rs".into(),
                    kind: ChangeKind::Modified,
                },
                FileChange {
                    path: "gone.rs".into(),
                    kind: ChangeKind::Deleted,
                },
            ],
        };
        assert_eq!(rev.changed_paths().collect::<Vec<_>>(), vec!["keep.rs"]);
    }

    #[test]
    fn test_feature_vector_lookup() {
        let v = FeatureVector {
            schema: "s".into(),
            names: vec!["a".into(), "b".into()],
            values: vec![1.0, 2.5],
        };
        assert_eq!(v.get("b"), Some(2.5));
        assert_eq!(v.get("c"), None);
        assert_eq!(v.len(), 2);
    }
}
