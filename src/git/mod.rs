//! Read-only access to revision history
//!
//! The pipeline only talks to [`RepositoryAccess`]. [`GitHistory`] backs it
//! with libgit2, [`MemoryRepository`] with an in-memory history for tests.
//!
//! # Example
//!
//! ```no_run
//! use readscope::git::{GitHistory, RepositoryAccess, RevisionRange, WalkOrder};
//! use std::path::Path;
//!
//! let history = GitHistory::open(Path::new("/path/to/repo")).unwrap();
//! for revision in history.walk(&RevisionRange::default(), WalkOrder::NewestFirst).unwrap() {
//!     let revision = revision.unwrap();
//!     println!("{} {}", revision.short_id(), revision.summary);
//! }
//! ```

pub mod history;
pub mod memory;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UnitError};
use crate::models::Revision;

pub use history::GitHistory;
pub use memory::MemoryRepository;

/// Lazily loaded revisions. Items fail individually with a [`UnitError`].
pub type RevisionIter<'a> = Box<dyn Iterator<Item = std::result::Result<Revision, UnitError>> + 'a>;

/// Order in which revisions are yielded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkOrder {
    #[default]
    NewestFirst,
    Chronological,
}

impl FromStr for WalkOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" | "newest_first" | "newest-first" => Ok(WalkOrder::NewestFirst),
            "oldest" | "chronological" => Ok(WalkOrder::Chronological),
            other => Err(format!("unknown order '{other}', expected newest or oldest")),
        }
    }
}

/// `from..to`, like `git log FROM..TO`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionRange {
    /// Excluded lower bound, together with its ancestors
    pub from: Option<String>,
    /// Included upper bound, `HEAD` when unset
    pub to: Option<String>,
    /// Keep only the newest N revisions of the range
    pub limit: Option<usize>,
}

impl RevisionRange {
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        Self {
            from,
            to,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

impl fmt::Display for RevisionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to = self.to.as_deref().unwrap_or("HEAD");
        match &self.from {
            Some(from) => write!(f, "{from}..{to}"),
            None => write!(f, "{to}"),
        }
    }
}

/// Read-only view of a revision history.
///
/// Implementations must be shareable across worker threads.
pub trait RepositoryAccess: Send + Sync {
    /// Human readable location, used in reports.
    fn location(&self) -> String;

    /// Walk the revisions in `range`.
    ///
    /// Endpoint resolution happens here and is fatal. Each revision is then
    /// loaded when the iterator reaches it, so an individual revision can
    /// fail without ending the walk.
    fn walk<'a>(&'a self, range: &RevisionRange, order: WalkOrder) -> Result<RevisionIter<'a>>;

    /// Raw content of `path` at `revision`.
    fn read_file(&self, revision: &str, path: &str) -> std::result::Result<Vec<u8>, UnitError>;

    /// Every file path present at `revision`.
    fn list_files(&self, revision: &str) -> std::result::Result<Vec<String>, UnitError>;
}
