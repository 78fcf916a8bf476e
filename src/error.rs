//! Error taxonomy
//!
//! Two layers:
//! - [`UnitError`] covers one source unit. It is recoverable and gets recorded
//!   in the report as a failure marker instead of aborting the run.
//! - [`ReadscopeError`] is fatal. It aborts the run and moves it to `FAILED`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Per-unit errors. These never abort a run on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnitError {
    /// The unit could not be tokenized (binary content, unsupported language,
    /// syntax errors, no code).
    #[error("parse error: {0}")]
    Parse(String),

    /// Feature vector does not match the model schema.
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),

    /// Path did not exist at the requested revision.
    #[error("{path} not found at revision {revision}")]
    NotFound { path: String, revision: String },

    /// I/O or object-database fault while reading one revision or file.
    #[error("repository error: {0}")]
    Repository(String),
}

impl UnitError {
    /// Short machine-friendly tag used by reporters and CSV output.
    pub fn kind(&self) -> &'static str {
        match self {
            UnitError::Parse(_) => "parse",
            UnitError::FeatureMismatch(_) => "feature_mismatch",
            UnitError::NotFound { .. } => "not_found",
            UnitError::Repository(_) => "repository",
        }
    }
}

impl From<git2::Error> for UnitError {
    fn from(e: git2::Error) -> Self {
        UnitError::Repository(e.message().to_string())
    }
}

/// Fatal errors that end a run.
#[derive(Error, Debug)]
pub enum ReadscopeError {
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("repository at {path} is not accessible: {reason}")]
    RepositoryUnavailable { path: PathBuf, reason: String },

    #[error("invalid revision range: {0}")]
    InvalidRange(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("aggregation failed: {0}")]
    Aggregation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadscopeError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ReadscopeError::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn template(reason: impl Into<String>) -> Self {
        ReadscopeError::Template(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, ReadscopeError>;
