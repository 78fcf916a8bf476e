//! Scoring pipeline
//!
//! Drives one run through its lifecycle:
//! 1. Resolve the model and check it against the extractor schema
//! 2. Walk revisions and read the selected files (serialized repository access)
//! 3. Extract and score units on a rayon pool
//! 4. Fold outcomes into a [`Report`] on a dedicated aggregator thread
//!
//! Per-unit failures are recorded and never stop the run. Fatal errors move
//! the run to `FAILED` and are returned as a [`RunFailure`].

pub mod cache;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{Aggregator, Outcome, ReportMeta};
use crate::error::{ReadscopeError, UnitError};
use crate::features::{FeatureExtractor, FEATURE_NAMES, SCHEMA};
use crate::git::{RepositoryAccess, RevisionRange, WalkOrder};
use crate::model::{Model, ModelSources};
use crate::models::{
    FeatureVector, Language, Report, Revision, RunState, ScopeSpan, ScoreRecord, SourceUnit,
    UnitFailure, UnitId,
};
use cache::{CacheKey, CachedScores, ScoreCache, Scored};

/// What one unit is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One score per file
    #[default]
    File,
    /// One score per function or method
    Function,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Granularity::File),
            "function" | "method" => Ok(Granularity::Function),
            other => Err(format!("unknown granularity '{other}', expected file or function")),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::File => write!(f, "file"),
            Granularity::Function => write!(f, "function"),
        }
    }
}

/// In-flight outcomes buffered per worker before senders block.
const OUTCOMES_PER_WORKER: usize = 64;

/// Run-level cancellation flag, checked between revisions and between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Path filter applied before any file is read.
pub type PathFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Callback invoked after each revision has been scored.
pub type ProgressFn = Box<dyn Fn(&Revision, usize) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub range: RevisionRange,
    pub order: WalkOrder,
    pub granularity: Granularity,
    /// Score every file at every revision instead of only the changed ones.
    pub all_files: bool,
    /// Keep paths without a known language so they surface as parse errors.
    pub keep_unsupported: bool,
    /// Worker threads, 0 for one per core
    pub workers: usize,
}

/// A run that ended in `FAILED`.
#[derive(Debug)]
pub struct RunFailure {
    /// Stage the run was in when it failed
    pub stage: RunState,
    pub error: ReadscopeError,
}

impl RunFailure {
    pub fn state(&self) -> RunState {
        RunState::Failed
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run failed during {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Lifecycle tracker for a single run.
#[derive(Debug, Default)]
struct Run {
    state: RunState,
}

impl Run {
    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state == next || self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        if self.state != next {
            debug!("Run {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn fail(&mut self, error: ReadscopeError) -> RunFailure {
        let stage = self.state;
        warn!("Run failed during {}: {}", stage, error);
        self.state = RunState::Failed;
        RunFailure { stage, error }
    }
}

/// Scores a revision history.
pub struct Pipeline<'r> {
    repo: &'r dyn RepositoryAccess,
    options: PipelineOptions,
    cancel: CancelToken,
    filter: Option<PathFilter>,
    progress: Option<ProgressFn>,
    extractor: FeatureExtractor,
    cache: ScoreCache,
}

impl<'r> Pipeline<'r> {
    pub fn new(repo: &'r dyn RepositoryAccess, options: PipelineOptions) -> Self {
        Self {
            repo,
            options,
            cancel: CancelToken::new(),
            filter: None,
            progress: None,
            extractor: FeatureExtractor::new(),
            cache: ScoreCache::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Skip paths for which `filter` returns false.
    pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(&Revision, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Resolve the model from `sources`, then run.
    ///
    /// Model problems fail the run before the repository is touched.
    pub fn run(&self, sources: &ModelSources) -> Result<Report, RunFailure> {
        let mut run = Run::default();
        let model = sources
            .resolve()
            .and_then(|model| model.check_schema(SCHEMA, &FEATURE_NAMES).map(|_| model));
        match model {
            Ok(model) => self.execute(&mut run, &model),
            Err(e) => Err(run.fail(e)),
        }
    }

    /// Run with an already loaded model.
    pub fn run_with_model(&self, model: &Model) -> Result<Report, RunFailure> {
        let mut run = Run::default();
        if let Err(e) = model.check_schema(SCHEMA, &FEATURE_NAMES) {
            return Err(run.fail(e));
        }
        self.execute(&mut run, model)
    }

    fn execute(&self, run: &mut Run, model: &Model) -> Result<Report, RunFailure> {
        let options = &self.options;
        run.advance(RunState::Walking);

        let revisions = match self.repo.walk(&options.range, options.order) {
            Ok(revisions) => revisions,
            Err(e) => return Err(run.fail(e)),
        };
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => return Err(run.fail(ReadscopeError::Config(e.to_string()))),
        };

        let (tx, rx) = bounded::<Outcome>(pool.current_num_threads() * OUTCOMES_PER_WORKER);
        let mut partial = false;

        let aggregated = std::thread::scope(|scope| {
            let aggregator = scope.spawn(move || {
                let mut aggregator = Aggregator::new(options.order);
                for outcome in rx {
                    aggregator.push(outcome);
                }
                aggregator
            });

            let mut scored_revisions = 0;
            for (index, revision) in revisions.enumerate() {
                if self.cancel.is_cancelled() {
                    info!("Cancelled after {} revisions", scored_revisions);
                    partial = true;
                    break;
                }
                let revision = match revision {
                    Ok(revision) => revision,
                    Err(error) => {
                        let unit = UnitId::new("", format!("#{index}"));
                        let _ = tx.send(Outcome::Failed(UnitFailure { unit, error }));
                        continue;
                    }
                };

                let Some((units, failures)) = self.read_units(&revision) else {
                    info!("Cancelled while reading {}", revision.short_id());
                    partial = true;
                    break;
                };

                run.advance(RunState::Scoring);
                let _ = tx.send(Outcome::Revision {
                    index,
                    revision: revision.clone(),
                });
                for failure in failures {
                    let _ = tx.send(Outcome::Failed(failure));
                }
                let timestamp = revision.timestamp;
                pool.install(|| {
                    units.par_iter().for_each_with(tx.clone(), |tx, unit| {
                        for outcome in self.score_unit(model, unit, timestamp) {
                            let _ = tx.send(outcome);
                        }
                    });
                });
                run.advance(RunState::Walking);

                scored_revisions += 1;
                if let Some(progress) = &self.progress {
                    progress(&revision, scored_revisions);
                }
            }
            drop(tx);
            aggregator.join()
        });

        run.advance(RunState::Aggregating);
        let aggregator = match aggregated {
            Ok(aggregator) => aggregator,
            Err(_) => {
                return Err(run.fail(ReadscopeError::Aggregation(
                    "aggregator thread panicked".into(),
                )))
            }
        };

        if aggregator.all_mismatched() {
            return Err(run.fail(ReadscopeError::model_load(
                model.source(),
                "every unit was rejected with a feature mismatch",
            )));
        }

        debug!(
            "Score cache: {} entries, {} hits",
            self.cache.len(),
            self.cache.hits()
        );
        let report = aggregator.finish(ReportMeta {
            repository: self.repo.location(),
            range: options.range.to_string(),
            model: model.info(),
            partial,
        });
        info!(
            "Scored {} units across {} revisions ({} failures)",
            report.records.len(),
            report.revisions_walked,
            report.failures.len()
        );
        Ok(report)
    }

    /// Paths to score at `revision`, before any content is read.
    fn select_paths(&self, revision: &Revision) -> Result<Vec<String>, UnitError> {
        let candidates: Vec<String> = if self.options.all_files {
            self.repo.list_files(&revision.id)?
        } else {
            revision.changed_paths().map(str::to_string).collect()
        };
        Ok(candidates
            .into_iter()
            .filter(|p| self.options.keep_unsupported || Language::from_path(p).is_some())
            .filter(|p| match &self.filter {
                Some(keep) => keep(p),
                None => true,
            })
            .collect())
    }

    /// Read every selected file of one revision.
    ///
    /// Returns `None` when cancelled midway, discarding the partial revision.
    fn read_units(&self, revision: &Revision) -> Option<(Vec<SourceUnit>, Vec<UnitFailure>)> {
        let mut units = Vec::new();
        let mut failures = Vec::new();

        let paths = match self.select_paths(revision) {
            Ok(paths) => paths,
            Err(error) => {
                failures.push(UnitFailure {
                    unit: UnitId::new("", revision.id.clone()),
                    error,
                });
                return Some((units, failures));
            }
        };
        debug!("{}: {} files selected", revision.short_id(), paths.len());

        for path in paths {
            if self.cancel.is_cancelled() {
                return None;
            }
            let id = UnitId::new(path, revision.id.clone());
            match self.repo.read_file(&revision.id, &id.path) {
                Ok(content) => units.push(SourceUnit::new(id, content)),
                Err(error) => failures.push(UnitFailure { unit: id, error }),
            }
        }
        Some((units, failures))
    }

    fn score_unit(&self, model: &Model, unit: &SourceUnit, timestamp: DateTime<Utc>) -> Vec<Outcome> {
        let key = CacheKey::new(unit.content(), unit.language(), self.options.granularity);
        let scored = self
            .cache
            .get_or_compute(key, || self.evaluate(model, unit));

        let id = unit.id();
        let entries = match scored.as_ref() {
            Ok(entries) => entries,
            Err(error) => {
                return vec![Outcome::Failed(UnitFailure {
                    unit: id.clone(),
                    error: error.clone(),
                })]
            }
        };
        let Some(language) = unit.language() else {
            return Vec::new();
        };

        entries
            .iter()
            .map(|entry| match entry {
                Ok(scored) => Outcome::Scored(ScoreRecord {
                    unit: match &scored.scope {
                        Some(scope) => id.with_scope(scope.clone()),
                        None => id.clone(),
                    },
                    language,
                    features: scored.features.clone(),
                    score: scored.score,
                    band: scored.band,
                    timestamp,
                }),
                Err((scope, error)) => Outcome::Failed(UnitFailure {
                    unit: match scope {
                        Some(scope) => id.with_scope(scope.clone()),
                        None => id.clone(),
                    },
                    error: error.clone(),
                }),
            })
            .collect()
    }

    fn evaluate(&self, model: &Model, unit: &SourceUnit) -> CachedScores {
        let score = |scope: Option<ScopeSpan>, features: FeatureVector| match model.score(&features) {
            Ok(score) => Ok(Scored {
                scope,
                band: model.band(score),
                features,
                score,
            }),
            Err(error) => Err((scope, error)),
        };

        match self.options.granularity {
            Granularity::File => {
                let features = self.extractor.extract(unit)?;
                Ok(vec![score(None, features)])
            }
            Granularity::Function => Ok(self
                .extractor
                .extract_scopes(unit)?
                .into_iter()
                .map(|s| score(Some(s.span), s.features))
                .collect()),
        }
    }
}

/// Trip `cancel` after `limit` elapses. A zero limit trips it at once.
pub fn cancel_after(cancel: CancelToken, limit: std::time::Duration) {
    if limit.is_zero() {
        warn!("Time limit of 0s, cancelling run");
        cancel.cancel();
        return;
    }
    std::thread::spawn(move || {
        std::thread::sleep(limit);
        if !cancel.is_cancelled() {
            warn!("Time limit of {:?} reached, cancelling run", limit);
            cancel.cancel();
        }
    });
}
