//! `readscope file`: score the working tree
//!
//! The collected files become a single synthetic revision, so the same
//! pipeline and reporters are used as for history scoring. `--lines`
//! narrows a single file to a marked snippet.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use tracing::debug;

use super::output::{self, ExitStatus};
use super::settings::{Flags, Settings};
use crate::config::ProjectConfig;
use crate::git::MemoryRepository;
use crate::models::Language;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::reporters::TemplateRegistry;

/// Revision id of the synthetic working-tree snapshot.
pub(super) const WORKTREE: &str = "worktree";

/// Inclusive, 1-based line range given as `A-B` (or `A` for one line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl FromStr for LineRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (start, end) = s.split_once('-').unwrap_or((s, s));
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| format!("'{s}' is not a line range like 10-25"))
        };
        let (start, end) = (parse(start)?, parse(end)?);
        if start == 0 {
            return Err("lines are numbered from 1".into());
        }
        if end < start {
            return Err(format!("range {start}-{end} ends before it starts"));
        }
        Ok(Self { start, end })
    }
}

impl LineRange {
    /// The selected lines with their common indentation removed.
    fn cut(&self, text: &str) -> Result<String> {
        let lines: Vec<&str> = text.lines().collect();
        if self.end > lines.len() {
            bail!("line {} is past the end ({} lines)", self.end, lines.len());
        }
        let selected = &lines[self.start - 1..self.end];
        let indent = selected
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);

        let mut out = String::new();
        for line in selected {
            out.push_str(line.get(indent..).unwrap_or_else(|| line.trim_start()));
            out.push('\n');
        }
        Ok(out)
    }
}

#[derive(Debug)]
struct Collected {
    /// display path -> file on disk
    files: BTreeMap<String, PathBuf>,
}

fn display_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").map(str::to_string).unwrap_or(text)
}

/// Explicit files are kept as given. Directories are walked honoring
/// `.gitignore` and keep only supported, non-excluded sources.
fn collect(paths: &[PathBuf], project: &ProjectConfig) -> Result<Collected> {
    let mut files = BTreeMap::new();
    for path in paths {
        if path.is_file() {
            files.insert(display_path(path), path.clone());
        } else if path.is_dir() {
            let walker = WalkBuilder::new(path)
                .hidden(true)
                .git_ignore(true)
                .git_global(false)
                .git_exclude(true)
                .require_git(false)
                .build();
            for entry in walker.flatten() {
                let file = entry.path();
                if !file.is_file() || Language::from_path(file).is_none() {
                    continue;
                }
                let shown = display_path(file);
                if project.should_exclude(&shown) {
                    continue;
                }
                files.insert(shown, file.to_path_buf());
            }
        } else {
            bail!("{} does not exist", path.display());
        }
    }
    Ok(Collected { files })
}

/// Snapshot the collected files. Unreadable files are recorded as broken.
fn snapshot(collected: &Collected, lines: Option<LineRange>) -> Result<MemoryRepository> {
    let mut contents: Vec<(&str, Vec<u8>)> = Vec::new();
    let mut unreadable = Vec::new();
    let mut newest = None::<SystemTime>;

    for (shown, path) in &collected.files {
        match std::fs::read(path) {
            Ok(bytes) => {
                let snippet = match (lines, std::str::from_utf8(&bytes)) {
                    (Some(range), Ok(text)) => Some(
                        range
                            .cut(text)
                            .with_context(|| format!("cannot select lines of {shown}"))?,
                    ),
                    _ => None,
                };
                let bytes = snippet.map(String::into_bytes).unwrap_or(bytes);
                contents.push((shown.as_str(), bytes));
            }
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                contents.push((shown.as_str(), Vec::new()));
                unreadable.push(shown.as_str());
            }
        }
        if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
            newest = Some(newest.map_or(modified, |n| n.max(modified)));
        }
    }

    let timestamp = newest.map(DateTime::<Utc>::from).unwrap_or_else(Utc::now);
    let entries: Vec<(&str, Option<&[u8]>)> = contents
        .iter()
        .map(|(path, bytes)| (*path, Some(bytes.as_slice())))
        .collect();

    let mut repo = MemoryRepository::new();
    repo.commit(WORKTREE, timestamp, &entries);
    for path in unreadable {
        repo.break_file(WORKTREE, path);
    }
    Ok(repo)
}

pub(super) fn run(
    paths: &[PathBuf],
    lines: Option<LineRange>,
    output: Option<&Path>,
    flags: Flags,
) -> Result<ExitStatus> {
    if lines.is_some() && !(paths.len() == 1 && paths[0].is_file()) {
        bail!("--lines needs exactly one file");
    }
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    let (settings, project) = Settings::load(flags, &cwd)
        .with_context(|| format!("invalid configuration in {}", cwd.display()))?;

    let collected = collect(paths, &project)?;
    if collected.files.is_empty() {
        bail!("no supported source files found");
    }
    debug!("Collected {} files", collected.files.len());
    let repo = snapshot(&collected, lines)?;

    let options = PipelineOptions {
        order: settings.order,
        granularity: settings.granularity,
        all_files: true,
        keep_unsupported: true,
        workers: settings.workers,
        ..Default::default()
    };
    let mut report = Pipeline::new(&repo, options)
        .run(&settings.sources)
        .context("scoring failed")?;

    let registry = TemplateRegistry::builtin().with_template_dir(settings.template_dir.clone());
    output::emit(&mut report, &registry, &settings.template, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{RepositoryAccess, RevisionRange, WalkOrder};

    #[test]
    fn test_collect_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/vendor")).unwrap();
        std::fs::write(root.join("src/app.py"), "x = 1\n").unwrap();
        std::fs::write(root.join("src/notes.txt"), "hello\n").unwrap();
        std::fs::write(root.join("src/vendor/lib.py"), "y = 2\n").unwrap();
        std::fs::write(root.join("README"), "readme\n").unwrap();

        let project = ProjectConfig::default();
        let collected = collect(
            &[root.join("src"), root.join("README")],
            &project,
        )
        .unwrap();
        let names: Vec<&str> = collected
            .files
            .values()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
        assert!(names.contains(&"app.py"));
        assert!(names.contains(&"README"));
    }

    #[test]
    fn test_collect_rejects_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect(&[dir.path().join("gone.rs")], &ProjectConfig::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_snapshot_is_one_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() {}\n").unwrap();
        let collected = Collected {
            files: BTreeMap::from([("a.rs".to_string(), path)]),
        };
        let repo = snapshot(&collected, None).unwrap();
        let revisions: Vec<_> = repo
            .walk(&RevisionRange::default(), WalkOrder::NewestFirst)
            .unwrap()
            .collect();
        assert_eq!(revisions.len(), 1);
        assert_eq!(repo.read_file(WORKTREE, "a.rs").unwrap(), b"fn main() {}\n");
    }

    #[test]
    fn test_line_range_parsing() {
        assert_eq!("3-9".parse(), Ok(LineRange { start: 3, end: 9 }));
        assert_eq!("7".parse(), Ok(LineRange { start: 7, end: 7 }));
        assert!("0-2".parse::<LineRange>().is_err());
        assert!("9-3".parse::<LineRange>().is_err());
        assert!("a-b".parse::<LineRange>().is_err());
    }

    #[test]
    fn test_snippet_is_cut_and_dedented() {
        let text = "def f(xs):\n    total = 0\n    for x in xs:\n        total += x\n    return total\n";
        let range = LineRange { start: 2, end: 4 };
        assert_eq!(range.cut(text).unwrap(), "total = 0\nfor x in xs:\n    total += x\n");
        assert!(LineRange { start: 4, end: 6 }.cut(text).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.py");
        std::fs::write(&path, text).unwrap();
        let collected = Collected {
            files: BTreeMap::from([("f.py".to_string(), path)]),
        };
        let repo = snapshot(&collected, Some(range)).unwrap();
        assert_eq!(
            repo.read_file(WORKTREE, "f.py").unwrap(),
            b"total = 0\nfor x in xs:\n    total += x\n"
        );
        assert!(snapshot(&collected, Some(LineRange { start: 1, end: 99 })).is_err());
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("./src/a.rs")), "src/a.rs");
        assert_eq!(display_path(Path::new("src/a.rs")), "src/a.rs");
    }
}
