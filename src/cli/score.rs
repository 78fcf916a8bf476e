//! `readscope score`: walk a git history

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::output::{self, ExitStatus};
use super::settings::{Flags, Settings};
use crate::git::{GitHistory, RevisionRange};
use crate::pipeline::{cancel_after, Pipeline, PipelineOptions};
use crate::reporters::TemplateRegistry;

pub(super) struct ScoreArgs {
    pub repo: PathBuf,
    pub from: Option<String>,
    pub to: Option<String>,
    pub all_files: bool,
    pub time_limit: Option<u64>,
    pub output: Option<PathBuf>,
    pub flags: Flags,
}

pub(super) fn run(args: ScoreArgs) -> Result<ExitStatus> {
    let history = GitHistory::open(&args.repo)?;
    let root = history.root().to_path_buf();
    let (settings, project) = Settings::load(args.flags, &root)
        .with_context(|| format!("invalid configuration in {}", root.display()))?;

    let options = PipelineOptions {
        range: RevisionRange::new(args.from, args.to).with_limit(settings.max_revisions),
        order: settings.order,
        granularity: settings.granularity,
        all_files: args.all_files,
        keep_unsupported: false,
        workers: settings.workers,
    };
    info!(
        "Scoring {} ({}, {} granularity)",
        root.display(),
        options.range,
        options.granularity
    );

    let spinner = output::spinner("Walking history...");
    let bar = spinner.clone();
    let pipeline = Pipeline::new(&history, options)
        .with_filter(project.exclusion_filter())
        .with_progress(move |revision, done| {
            bar.set_message(format!("Scored {} revisions ({})", done, revision.short_id()));
        });
    if let Some(secs) = args.time_limit {
        cancel_after(pipeline.cancel_token(), Duration::from_secs(secs));
    }

    let result = pipeline.run(&settings.sources);
    spinner.finish_and_clear();
    let mut report = result.context("scoring failed")?;

    let registry = TemplateRegistry::builtin().with_template_dir(settings.template_dir.clone());
    output::emit(&mut report, &registry, &settings.template, args.output.as_deref())
}
