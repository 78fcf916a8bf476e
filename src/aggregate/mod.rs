//! Report aggregation
//!
//! The [`Aggregator`] is the single consumer of scoring outcomes. Workers
//! push outcomes in whatever order they finish. `finish` sorts them back
//! into walk order and derives the summary statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tracing::debug;

use crate::error::UnitError;
use crate::git::WalkOrder;
use crate::models::{
    BandCounts, FileTrend, ModelInfo, RatingBand, Report, Revision, RevisionSummary, RunState,
    ScoreRecord, Summary, UnitFailure,
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One message from the walker or a scoring worker.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A revision was fully read and handed to the workers.
    Revision { index: usize, revision: Revision },
    Scored(ScoreRecord),
    Failed(UnitFailure),
}

/// Run metadata copied into the report.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub repository: String,
    pub range: String,
    pub model: ModelInfo,
    pub partial: bool,
}

#[derive(Debug)]
pub struct Aggregator {
    order: WalkOrder,
    /// revision id -> walk index
    revisions: HashMap<String, usize>,
    records: Vec<ScoreRecord>,
    failures: Vec<UnitFailure>,
    mismatches: usize,
}

impl Aggregator {
    pub fn new(order: WalkOrder) -> Self {
        Self {
            order,
            revisions: HashMap::new(),
            records: Vec::new(),
            failures: Vec::new(),
            mismatches: 0,
        }
    }

    pub fn push(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Revision { index, revision } => {
                self.revisions.insert(revision.id, index);
            }
            Outcome::Scored(record) => self.records.push(record),
            Outcome::Failed(failure) => {
                if matches!(failure.error, UnitError::FeatureMismatch(_)) {
                    self.mismatches += 1;
                }
                self.failures.push(failure);
            }
        }
    }

    pub fn revisions_walked(&self) -> usize {
        self.revisions.len()
    }

    /// True when units were attempted and every one was rejected by the model.
    pub fn all_mismatched(&self) -> bool {
        self.records.is_empty() && self.mismatches > 0 && self.mismatches == self.failures.len()
    }

    pub fn finish(mut self, meta: ReportMeta) -> Report {
        let walk_index = |revision: &str| {
            self.revisions
                .get(revision)
                .copied()
                .unwrap_or(usize::MAX)
        };
        self.records.sort_by(|a, b| {
            walk_index(&a.unit.revision)
                .cmp(&walk_index(&b.unit.revision))
                .then_with(|| a.unit.path.cmp(&b.unit.path))
                .then_with(|| scope_line(a).cmp(&scope_line(b)))
        });
        self.failures.sort_by(|a, b| {
            walk_index(&a.unit.revision)
                .cmp(&walk_index(&b.unit.revision))
                .then_with(|| a.unit.path.cmp(&b.unit.path))
        });

        let chronological = self.chronological_records();
        let summary = summarize(&self.records, self.failures.len());
        let files = file_trends(&chronological);
        let mut revisions = revision_summaries(&chronological);
        if self.order == WalkOrder::NewestFirst {
            revisions.reverse();
        }
        debug!(
            "Aggregated {} records, {} failures over {} revisions",
            self.records.len(),
            self.failures.len(),
            self.revisions.len()
        );

        Report {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            repository: meta.repository,
            range: meta.range,
            model: meta.model,
            state: RunState::Aggregating,
            partial: meta.partial,
            revisions_walked: self.revisions.len(),
            records: self.records,
            failures: self.failures,
            summary,
            files,
            revisions,
        }
    }

    /// Records ordered oldest revision first.
    fn chronological_records(&self) -> Vec<&ScoreRecord> {
        let mut records: Vec<&ScoreRecord> = self.records.iter().collect();
        if self.order == WalkOrder::NewestFirst {
            // stable: keeps path order within a revision
            let index = |r: &ScoreRecord| {
                self.revisions
                    .get(&r.unit.revision)
                    .copied()
                    .unwrap_or(0)
            };
            records.sort_by_key(|r| std::cmp::Reverse(index(r)));
        }
        records
    }
}

fn scope_line(record: &ScoreRecord) -> usize {
    record.unit.scope.as_ref().map(|s| s.start_line).unwrap_or(0)
}

/// Key identifying the same unit across revisions.
///
/// Scopes sharing a name within one file (overloads, anonymous functions)
/// are told apart by their position among namesakes: the second `get` in a
/// file is `A.java::get#2`.
fn trend_key(record: &ScoreRecord, occurrence: usize) -> String {
    match &record.unit.scope {
        Some(scope) if occurrence > 1 => {
            format!("{}::{}#{}", record.unit.path, scope.name, occurrence)
        }
        Some(scope) => format!("{}::{}", record.unit.path, scope.name),
        None => record.unit.path.clone(),
    }
}

/// Mean, median, extremes, band counts and trend over all records.
pub fn summarize(records: &[ScoreRecord], failures: usize) -> Summary {
    let mut scores: Vec<f64> = records.iter().map(|r| r.score).collect();
    scores.sort_by(|a, b| a.total_cmp(b));

    let mut bands = BandCounts::default();
    for record in records {
        match record.band {
            RatingBand::Low => bands.low += 1,
            RatingBand::Medium => bands.medium += 1,
            RatingBand::High => bands.high += 1,
        }
    }

    let n = scores.len();
    let median = match n {
        0 => None,
        _ if n % 2 == 1 => Some(scores[n / 2]),
        _ => Some((scores[n / 2 - 1] + scores[n / 2]) / 2.0),
    };

    Summary {
        count: n,
        failures,
        mean: (n > 0).then(|| scores.iter().sum::<f64>() / n as f64),
        median,
        min: scores.first().copied(),
        max: scores.last().copied(),
        trend_per_day: trend(records),
        bands,
    }
}

/// Least-squares slope of score against time, in score units per day.
///
/// `None` unless the records span at least two distinct timestamps.
pub fn trend(records: &[ScoreRecord]) -> Option<f64> {
    let first = records.first()?.timestamp;
    let points: Vec<(f64, f64)> = records
        .iter()
        .map(|r| {
            let days = (r.timestamp - first).num_seconds() as f64 / SECONDS_PER_DAY;
            (days, r.score)
        })
        .collect();

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    Some(sxy / sxx)
}

/// First-to-last score change per unit, over records in chronological order.
///
/// Records of one revision arrive sorted by path and scope start line.
fn file_trends(chronological: &[&ScoreRecord]) -> Vec<FileTrend> {
    let mut by_key: BTreeMap<String, FileTrend> = BTreeMap::new();
    let mut namesakes: HashMap<(&str, &str, &str), usize> = HashMap::new();
    for record in chronological {
        let name = record.unit.scope.as_ref().map(|s| s.name.as_str()).unwrap_or("");
        let occurrence = namesakes
            .entry((record.unit.revision.as_str(), record.unit.path.as_str(), name))
            .or_insert(0);
        *occurrence += 1;
        let key = trend_key(record, *occurrence);

        by_key
            .entry(key.clone())
            .and_modify(|t| {
                t.samples += 1;
                t.last_score = record.score;
                t.delta = t.last_score - t.first_score;
            })
            .or_insert_with(|| FileTrend {
                path: key,
                samples: 1,
                first_score: record.score,
                last_score: record.score,
                delta: 0.0,
            });
    }
    by_key.into_values().collect()
}

/// Per-revision mean, oldest first, with deltas against the previous revision.
fn revision_summaries(chronological: &[&ScoreRecord]) -> Vec<RevisionSummary> {
    let mut out: Vec<RevisionSummary> = Vec::new();
    let mut sum = 0.0;
    for record in chronological {
        match out.last_mut() {
            Some(current) if current.revision == record.unit.revision => {
                current.units += 1;
                sum += record.score;
                current.mean = sum / current.units as f64;
            }
            _ => {
                out.push(RevisionSummary {
                    revision: record.unit.revision.clone(),
                    timestamp: record.timestamp,
                    units: 1,
                    mean: record.score,
                    delta: None,
                });
                sum = record.score;
            }
        }
    }
    for i in 1..out.len() {
        out[i].delta = Some(out[i].mean - out[i - 1].mean);
    }
    out
}
