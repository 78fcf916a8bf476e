//! Git history access using libgit2
//!
//! Walks commits and reads blobs through the git2 crate. `git2::Repository`
//! is not `Sync`, so every access goes through one mutex.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, ErrorCode, ObjectType, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{RepositoryAccess, RevisionIter, RevisionRange, WalkOrder};
use crate::error::{ReadscopeError, Result, UnitError};
use crate::models::{ChangeKind, FileChange, Revision};

/// Git repository opened for reading.
pub struct GitHistory {
    repo: Mutex<Repository>,
    root: PathBuf,
}

impl GitHistory {
    /// Open a git repository.
    ///
    /// # Arguments
    /// * `path` - Path to the repository (or any subdirectory)
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|e| ReadscopeError::RepositoryUnavailable {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        debug!("Opened git repository at {:?}", repo.path());
        Ok(Self {
            repo: Mutex::new(repo),
            root,
        })
    }

    /// Check if a path is inside a git repository.
    pub fn is_git_repo(path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Working directory root (the git dir for bare repositories).
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Repository>, UnitError> {
        self.repo
            .lock()
            .map_err(|_| UnitError::Repository("repository lock poisoned".into()))
    }

    /// Resolve the range endpoints and list commit ids, newest first.
    fn resolve(&self, range: &RevisionRange) -> Result<Vec<Oid>> {
        let repo = self
            .repo
            .lock()
            .map_err(|_| ReadscopeError::InvalidRange("repository lock poisoned".into()))?;

        let to = range.to.as_deref().unwrap_or("HEAD");
        let to_oid = resolve_commit(&repo, to)?;
        let from_oid = range
            .from
            .as_deref()
            .map(|from| resolve_commit(&repo, from))
            .transpose()?;

        let mut revwalk = repo.revwalk().map_err(range_error)?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(range_error)?;
        revwalk.push(to_oid).map_err(range_error)?;
        if let Some(from) = from_oid {
            revwalk.hide(from).map_err(range_error)?;
        }

        let mut oids = Vec::new();
        for oid in revwalk {
            if range.limit.is_some_and(|limit| oids.len() >= limit) {
                break;
            }
            oids.push(oid.map_err(range_error)?);
        }
        debug!("Resolved {} revisions for {}", oids.len(), range);
        Ok(oids)
    }

    /// Load commit details and the first-parent diff of one commit.
    fn load_revision(&self, oid: Oid) -> std::result::Result<Revision, UnitError> {
        let repo = self.lock()?;
        let commit = repo.find_commit(oid)?;

        let parent = commit.parent(0).ok();
        let tree = commit.tree()?;
        let parent_tree = parent.as_ref().map(|p| p.tree()).transpose()?;

        let mut diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        diff.find_similar(None)?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let kind = match delta.status() {
                Delta::Added | Delta::Copied => ChangeKind::Added,
                Delta::Deleted => ChangeKind::Deleted,
                Delta::Renamed => ChangeKind::Renamed,
                Delta::Modified | Delta::Typechange => ChangeKind::Modified,
                _ => continue,
            };
            let file = if kind == ChangeKind::Deleted {
                delta.old_file()
            } else {
                delta.new_file()
            };
            if let Some(path) = file.path() {
                changes.push(FileChange {
                    path: path.to_string_lossy().to_string(),
                    kind,
                });
            }
        }

        let author = commit.author();
        Ok(Revision {
            id: oid.to_string(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            timestamp: git_time(&commit.time()),
            author: author.name().unwrap_or("Unknown").to_string(),
            summary: commit.summary().unwrap_or("").to_string(),
            changes,
        })
    }
}

impl RepositoryAccess for GitHistory {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn walk<'a>(&'a self, range: &RevisionRange, order: WalkOrder) -> Result<RevisionIter<'a>> {
        let mut oids = self.resolve(range)?;
        if order == WalkOrder::Chronological {
            oids.reverse();
        }
        Ok(Box::new(
            oids.into_iter().map(move |oid| self.load_revision(oid)),
        ))
    }

    fn read_file(&self, revision: &str, path: &str) -> std::result::Result<Vec<u8>, UnitError> {
        let repo = self.lock()?;
        let oid = Oid::from_str(revision)?;
        let tree = repo.find_commit(oid)?.tree()?;

        let not_found = || UnitError::NotFound {
            path: path.to_string(),
            revision: revision.to_string(),
        };
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(not_found());
        }
        let blob = repo.find_blob(entry.id())?;
        Ok(blob.content().to_vec())
    }

    fn list_files(&self, revision: &str) -> std::result::Result<Vec<String>, UnitError> {
        let repo = self.lock()?;
        let oid = Oid::from_str(revision)?;
        let tree = repo.find_commit(oid)?.tree()?;

        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                files.push(format!("{}{}", dir, entry.name().unwrap_or("")));
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }
}

fn resolve_commit(repo: &Repository, spec: &str) -> Result<Oid> {
    let object = repo
        .revparse_single(spec)
        .map_err(|e| ReadscopeError::InvalidRange(format!("cannot resolve '{spec}': {}", e.message())))?;
    let commit = object
        .peel_to_commit()
        .map_err(|e| ReadscopeError::InvalidRange(format!("'{spec}' is not a commit: {}", e.message())))?;
    Ok(commit.id())
}

fn range_error(e: git2::Error) -> ReadscopeError {
    ReadscopeError::InvalidRange(e.message().to_string())
}

fn git_time(time: &git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_default()
}
