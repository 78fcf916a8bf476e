//! End-to-end tests driving the readscope binary
//!
//! Each test builds a throwaway git repository with git2 and checks the
//! report and exit code contract of the CLI.

use std::path::Path;
use std::process::Command;

use git2::{Oid, Repository, Signature, Time};
use serde_json::Value;

const DAY: i64 = 86_400;
const EPOCH: i64 = 1_700_000_000;

fn readscope(dir: &Path, config_home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_readscope"))
        .args(args)
        .current_dir(dir)
        .env_remove("READSCOPE_MODEL")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .output()
        .expect("run readscope");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn commit(repo: &Repository, seconds: i64, message: &str, files: &[(&str, &[u8])]) -> Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::new("Dev", "dev@example.com", &Time::new(seconds, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

fn python_source(i: usize) -> String {
    format!(
        "def total_{i}(items):\n    result = 0\n    for item in items:\n        result += item * {i}\n    return result\n"
    )
}

/// Five commits R1..R5 of `src/lib.py`, one day apart. `corrupt` replaces
/// the content at that (1-based) revision with binary data.
fn five_commit_repo(corrupt: Option<usize>) -> (tempfile::TempDir, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let mut ids = Vec::new();
    for i in 1..=5 {
        let content = if corrupt == Some(i) {
            b"\x00\x01\x02 not source".to_vec()
        } else {
            python_source(i).into_bytes()
        };
        let oid = commit(&repo, EPOCH + i as i64 * DAY, &format!("R{i}"), &[("src/lib.py", &content)]);
        ids.push(oid.to_string());
    }
    (dir, ids)
}

fn parse(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("not JSON ({e}): {stdout}"))
}

#[test]
fn test_score_history_newest_first() {
    let (dir, ids) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = readscope(dir.path(), home.path(), &["score", ".", "-t", "json"]);
    assert_eq!(code, 0, "stderr: {stderr}");

    let report = parse(&stdout);
    assert_eq!(report["state"], "RENDERED");
    assert_eq!(report["revisions_walked"], 5);
    let records = report["records"].as_array().unwrap();
    assert_eq!(records.len(), 5);
    let walked: Vec<&str> = records
        .iter()
        .map(|r| r["unit"]["revision"].as_str().unwrap())
        .collect();
    let expected: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
    assert_eq!(walked, expected);

    for record in records {
        let score = record["score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(record["features"]["values"].as_array().unwrap().len(), 26);
    }
}

#[test]
fn test_corrupt_revision_is_a_warning() {
    let (dir, ids) = five_commit_repo(Some(3));
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = readscope(dir.path(), home.path(), &["score", ".", "-t", "json"]);
    assert_eq!(code, 3, "stderr: {stderr}");

    let report = parse(&stdout);
    assert_eq!(report["state"], "RENDERED");
    assert_eq!(report["records"].as_array().unwrap().len(), 4);
    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["error"]["kind"], "parse");
    assert_eq!(failures[0]["unit"]["revision"], ids[2].as_str());
}

#[test]
fn test_chronological_order_and_limit() {
    let (dir, ids) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = readscope(
        dir.path(),
        home.path(),
        &["score", ".", "-t", "json", "--order", "oldest", "--max-revisions", "2"],
    );
    assert_eq!(code, 0);
    let report = parse(&stdout);
    let walked: Vec<&str> = report["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["unit"]["revision"].as_str().unwrap())
        .collect();
    assert_eq!(walked, vec![ids[3].as_str(), ids[4].as_str()]);
}

#[test]
fn test_range_excludes_lower_bound() {
    let (dir, ids) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = readscope(
        dir.path(),
        home.path(),
        &["score", ".", "-t", "json", "--from", &ids[1], "--to", &ids[3]],
    );
    assert_eq!(code, 0);
    assert_eq!(parse(&stdout)["records"].as_array().unwrap().len(), 2);

    let (code, _, stderr) = readscope(dir.path(), home.path(), &["score", ".", "--to", "no-such-rev"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("invalid revision range"), "{stderr}");
}

#[test]
fn test_expired_time_limit_gives_partial_report() {
    let (dir, _) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = readscope(
        dir.path(),
        home.path(),
        &["score", ".", "-t", "json", "--time-limit", "0"],
    );
    assert_eq!(code, 3, "stderr: {stderr}");
    let report = parse(&stdout);
    assert_eq!(report["state"], "RENDERED");
    assert_eq!(report["partial"], true);
    assert_eq!(report["revisions_walked"], 0);
    assert!(report["records"].as_array().unwrap().is_empty());
}

#[test]
fn test_missing_model_fails() {
    let (dir, _) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = readscope(
        dir.path(),
        home.path(),
        &["score", ".", "--model", "/nonexistent/readability_model"],
    );
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("failed to load model"), "{stderr}");
}

#[test]
fn test_not_a_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = readscope(dir.path(), home.path(), &["score", "."]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not accessible"), "{stderr}");
}

#[test]
fn test_unknown_template_falls_back_to_json() {
    let (dir, _) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = readscope(dir.path(), home.path(), &["score", ".", "-t", "fancy"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("template 'fancy' not found"), "{stderr}");
    assert_eq!(parse(&stdout)["records"].as_array().unwrap().len(), 5);
}

#[test]
fn test_project_config_custom_template() {
    let (dir, _) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("templates")).unwrap();
    std::fs::write(
        dir.path().join("templates/brief.tmpl"),
        "units={{ summary.count }}\n{{#files}}{{ path }} {{ samples }}\n{{/files}}",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("readscope.toml"),
        "template = \"brief\"\ntemplate_dir = \"templates\"\n",
    )
    .unwrap();

    let (code, stdout, stderr) = readscope(dir.path(), home.path(), &["score", "."]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout, "units=5\nsrc/lib.py 5\n");
}

#[test]
fn test_output_file_and_text_template() {
    let (dir, _) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.md");
    let (code, stdout, _) = readscope(
        dir.path(),
        home.path(),
        &["score", ".", "-t", "md", "-o", out.to_str().unwrap()],
    );
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("# Readability Report"));
}

#[test]
fn test_function_granularity() {
    let (dir, _) = five_commit_repo(None);
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = readscope(
        dir.path(),
        home.path(),
        &["score", ".", "-t", "json", "-g", "function"],
    );
    assert_eq!(code, 0);
    let report = parse(&stdout);
    let first = &report["records"][0]["unit"]["scope"];
    assert_eq!(first["name"], "total_5");
    assert_eq!(first["start_line"], 1);
}

#[test]
fn test_file_command_scores_working_tree() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/a.py"), python_source(1)).unwrap();
    std::fs::write(dir.path().join("src/b.rs"), "fn main() {\n    println!(\"hi\");\n}\n").unwrap();
    std::fs::write(dir.path().join("src/notes.txt"), "skipped by the walk\n").unwrap();
    std::fs::write(dir.path().join("NOTES"), "explicit, unsupported\n").unwrap();

    let (code, stdout, stderr) = readscope(dir.path(), home.path(), &["file", "src", "-t", "json"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let report = parse(&stdout);
    assert_eq!(report["records"].as_array().unwrap().len(), 2);
    assert_eq!(report["revisions_walked"], 1);

    let (code, stdout, _) = readscope(dir.path(), home.path(), &["file", "src/a.py", "NOTES", "-t", "csv"]);
    assert_eq!(code, 3);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("ok,worktree,src/a.py,"));
    assert!(lines[2].starts_with("parse,worktree,NOTES,"));
}

#[test]
fn test_file_command_scores_marked_lines() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), python_source(2)).unwrap();

    let (code, stdout, stderr) =
        readscope(dir.path(), home.path(), &["file", "a.py", "--lines", "2-4", "-t", "json"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let snippet = parse(&stdout);
    let records = snippet["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["unit"]["path"], "a.py");

    let (_, stdout, _) = readscope(dir.path(), home.path(), &["file", "a.py", "-t", "json"]);
    let whole = parse(&stdout);
    assert_ne!(records[0]["features"], whole["records"][0]["features"]);

    let (code, _, stderr) = readscope(dir.path(), home.path(), &["file", ".", "--lines", "1-2"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("exactly one file"), "{stderr}");

    let (code, _, stderr) = readscope(dir.path(), home.path(), &["file", "a.py", "--lines", "4-40"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("past the end"), "{stderr}");
}

#[test]
fn test_hints_and_model_commands() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), python_source(2)).unwrap();

    let (code, stdout, stderr) = readscope(dir.path(), home.path(), &["hints", "a.py", "--top", "1"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("total_2 (L1-5)"), "{stdout}");

    let (code, stdout, _) = readscope(dir.path(), home.path(), &["model"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("readscope.features.v1"));
    assert!(stdout.contains("<embedded>"));

    let model = dir.path().join("readability_model");
    std::fs::write(&model, include_str!("../models/readability_model.json")).unwrap();
    let (code, stdout, _) = readscope(dir.path(), home.path(), &["model", "--check", "readability_model"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("OK"));

    // The repository-root model file is now picked up by default
    let (_, stdout, _) = readscope(dir.path(), home.path(), &["model"]);
    assert!(!stdout.contains("<embedded>"), "{stdout}");

    std::fs::write(&model, "{\"format\": \"something-else\"}").unwrap();
    let (code, _, stderr) = readscope(dir.path(), home.path(), &["model", "--check", "readability_model"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("failed to load model"), "{stderr}");
}
