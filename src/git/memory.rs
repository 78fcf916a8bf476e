//! Synthetic in-memory history
//!
//! A linear sequence of snapshots. Used by tests and by callers that want to
//! score content that never touched a git repository.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use super::{RepositoryAccess, RevisionIter, RevisionRange, WalkOrder};
use crate::error::{ReadscopeError, Result, UnitError};
use crate::models::{ChangeKind, FileChange, Revision};

#[derive(Debug, Clone)]
struct Snapshot {
    revision: Revision,
    files: BTreeMap<String, Vec<u8>>,
}

/// Linear history held in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    snapshots: Vec<Snapshot>,
    /// `(revision, path)` pairs whose reads fail with a repository error
    broken: HashSet<(String, String)>,
    reads: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a revision on top of the current head.
    ///
    /// `None` content deletes the path.
    pub fn commit(
        &mut self,
        id: &str,
        timestamp: DateTime<Utc>,
        files: &[(&str, Option<&[u8]>)],
    ) -> &mut Self {
        let previous = self.snapshots.last();
        let mut snapshot = previous.map(|s| s.files.clone()).unwrap_or_default();
        let parents = previous.map(|s| vec![s.revision.id.clone()]).unwrap_or_default();

        let mut changes = Vec::new();
        for (path, content) in files {
            let existed = snapshot.contains_key(*path);
            let kind = match content {
                Some(bytes) => {
                    snapshot.insert(path.to_string(), bytes.to_vec());
                    if existed {
                        ChangeKind::Modified
                    } else {
                        ChangeKind::Added
                    }
                }
                None => {
                    if snapshot.remove(*path).is_none() {
                        continue;
                    }
                    ChangeKind::Deleted
                }
            };
            changes.push(FileChange {
                path: path.to_string(),
                kind,
            });
        }

        self.snapshots.push(Snapshot {
            revision: Revision {
                id: id.to_string(),
                parents,
                timestamp,
                author: "memory".to_string(),
                summary: id.to_string(),
                changes,
            },
            files: snapshot,
        });
        self
    }

    /// Make reads of `path` at `revision` fail with a repository error.
    pub fn break_file(&mut self, revision: &str, path: &str) -> &mut Self {
        self.broken.insert((revision.to_string(), path.to_string()));
        self
    }

    /// Number of `read_file` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.snapshots
            .iter()
            .position(|s| s.revision.id == id)
            .ok_or_else(|| ReadscopeError::InvalidRange(format!("cannot resolve '{id}'")))
    }

    fn snapshot(&self, revision: &str) -> std::result::Result<&Snapshot, UnitError> {
        self.snapshots
            .iter()
            .find(|s| s.revision.id == revision)
            .ok_or_else(|| UnitError::Repository(format!("unknown revision {revision}")))
    }
}

impl RepositoryAccess for MemoryRepository {
    fn location(&self) -> String {
        "<memory>".to_string()
    }

    fn walk<'a>(&'a self, range: &RevisionRange, order: WalkOrder) -> Result<RevisionIter<'a>> {
        let end = match range.to.as_deref() {
            None | Some("HEAD") => {
                if self.snapshots.is_empty() {
                    return Err(ReadscopeError::InvalidRange("history is empty".into()));
                }
                self.snapshots.len() - 1
            }
            Some(id) => self.index_of(id)?,
        };
        let start = match range.from.as_deref() {
            Some(id) => self.index_of(id)? + 1,
            None => 0,
        };

        let mut selected: Vec<&Snapshot> = self
            .snapshots
            .get(start..=end)
            .unwrap_or(&[])
            .iter()
            .rev()
            .collect();
        if let Some(limit) = range.limit {
            selected.truncate(limit);
        }
        if order == WalkOrder::Chronological {
            selected.reverse();
        }
        Ok(Box::new(
            selected.into_iter().map(|s| Ok::<_, UnitError>(s.revision.clone())),
        ))
    }

    fn read_file(&self, revision: &str, path: &str) -> std::result::Result<Vec<u8>, UnitError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self
            .broken
            .contains(&(revision.to_string(), path.to_string()))
        {
            return Err(UnitError::Repository(format!(
                "object for {path} at {revision} is corrupt"
            )));
        }
        self.snapshot(revision)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| UnitError::NotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            })
    }

    fn list_files(&self, revision: &str) -> std::result::Result<Vec<String>, UnitError> {
        Ok(self.snapshot(revision)?.files.keys().cloned().collect())
    }
}
