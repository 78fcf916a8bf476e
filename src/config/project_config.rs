//! Project-level configuration support
//!
//! Loads per-project configuration from `readscope.toml` or
//! `.readscoperc.json` in the repository root.
//!
//! # Configuration Format
//!
//! ```toml
//! # readscope.toml
//! model = "tools/readability_model"
//! template = "markdown"
//! template_dir = ".readscope/templates"
//! granularity = "function"
//! order = "oldest"
//! workers = 4
//! max_revisions = 200
//!
//! [exclude]
//! paths = ["generated/", "**/fixtures/**"]
//! ```
//!
//! Relative paths are resolved against the repository root.

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ReadscopeError, Result};
use crate::git::WalkOrder;
use crate::pipeline::Granularity;

/// Vendored and generated code skipped unless `skip_defaults = true`.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/vendor/**",
    "**/node_modules/**",
    "**/third_party/**",
    "**/dist/**",
    "**/*.min.js",
];

/// Config file names, in lookup order.
pub const CONFIG_FILES: &[&str] = &["readscope.toml", ".readscoperc.json"];

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Model file
    #[serde(default)]
    pub model: Option<PathBuf>,

    /// Default template name
    #[serde(default)]
    pub template: Option<String>,

    /// Directory holding `<name>.tmpl` files
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    /// `file` or `function`
    #[serde(default)]
    pub granularity: Option<String>,

    /// `newest` or `oldest`
    #[serde(default)]
    pub order: Option<String>,

    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub max_revisions: Option<usize>,

    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Directory the config was loaded from
    #[serde(skip)]
    root: PathBuf,
}

/// Path exclusion configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub paths: Vec<String>,

    /// Disable [`DEFAULT_EXCLUDE_PATTERNS`]
    #[serde(default)]
    pub skip_defaults: bool,
}

impl ExcludeConfig {
    /// Defaults (unless skipped) followed by the user patterns.
    pub fn effective_patterns(&self) -> Vec<String> {
        let defaults = if self.skip_defaults {
            &[][..]
        } else {
            DEFAULT_EXCLUDE_PATTERNS
        };
        let mut patterns: Vec<String> = defaults.iter().map(|s| s.to_string()).collect();
        for p in &self.paths {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }
        patterns
    }
}

/// Load project configuration from the repository root.
///
/// Returns the default configuration when no config file exists. A config
/// file that exists but does not parse is an error.
pub fn load_project_config(root: &Path) -> Result<ProjectConfig> {
    for name in CONFIG_FILES {
        let path = root.join(name);
        if !path.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let parsed = if name.ends_with(".json") {
            serde_json::from_str::<ProjectConfig>(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str::<ProjectConfig>(&content).map_err(|e| e.to_string())
        };
        let mut config =
            parsed.map_err(|e| ReadscopeError::Config(format!("{}: {e}", path.display())))?;
        config.root = root.to_path_buf();
        config.validate(&path)?;
        debug!("Loaded project config from {}", path.display());
        return Ok(config);
    }

    debug!("No project config found, using defaults");
    Ok(ProjectConfig {
        root: root.to_path_buf(),
        ..ProjectConfig::default()
    })
}

impl ProjectConfig {
    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |e: String| ReadscopeError::Config(format!("{}: {e}", path.display()));
        self.granularity().map_err(invalid)?;
        self.order().map_err(invalid)?;
        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn granularity(&self) -> std::result::Result<Option<Granularity>, String> {
        self.granularity.as_deref().map(str::parse).transpose()
    }

    pub fn order(&self) -> std::result::Result<Option<WalkOrder>, String> {
        self.order.as_deref().map(str::parse).transpose()
    }

    /// Model path resolved against the repository root.
    pub fn model_path(&self) -> Option<PathBuf> {
        self.model.as_ref().map(|p| self.root.join(p))
    }

    /// Template directory resolved against the repository root.
    pub fn template_dir_path(&self) -> Option<PathBuf> {
        self.template_dir.as_ref().map(|p| self.root.join(p))
    }

    /// Check if a repository-relative path should be excluded
    pub fn should_exclude(&self, path: &str) -> bool {
        self.exclude
            .effective_patterns()
            .iter()
            .any(|pattern| glob_match(pattern, path))
    }

    /// Compiled exclusion matcher for per-file use on worker threads.
    pub fn exclusion_filter(&self) -> impl Fn(&str) -> bool + Send + Sync + 'static {
        let globs: Vec<Regex> = self
            .exclude
            .effective_patterns()
            .iter()
            .filter_map(|p| glob_regex(p))
            .collect();
        move |path: &str| !globs.iter().any(|g| g.is_match(path))
    }
}

/// Translate a glob into an anchored regex.
///
/// `**/` matches any number of leading directories, `**` anything, `*` and
/// `?` stay inside one path segment. A pattern with no wildcard matches as a
/// path prefix, so `generated/` covers everything below it.
fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut wildcard = false;
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                wildcard = true;
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => {
                wildcard = true;
                re.push_str("[^/]*");
            }
            '?' => {
                wildcard = true;
                re.push_str("[^/]");
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    if wildcard {
        re.push('$');
    }
    Regex::new(&re).ok()
}

/// Glob match against a repository-relative path.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    glob_regex(pattern).is_some_and(|re| re.is_match(path))
}
