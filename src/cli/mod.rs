//! CLI command definitions and handlers

mod file;
mod hints;
mod model;
mod output;
mod score;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::git::WalkOrder;
use crate::pipeline::Granularity;

pub use output::ExitStatus;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// readscope - code readability scoring
#[derive(Parser, Debug)]
#[command(name = "readscope")]
#[command(
    version,
    about = "Score the readability of source code, one file, one function or a whole git history at a time",
    after_help = "\
Examples:
  readscope score .                              Score the files changed in every commit
  readscope score . --from v1.0 -t markdown      Score the commits after v1.0 as Markdown
  readscope score . --granularity function       One score per function
  readscope file src/ --template csv             Score the working tree
  readscope file src/lib.rs --lines 40-72        Score a marked snippet
  readscope hints src/parser.rs --top 3          Suggest readability improvements
  readscope model --check my_model.json          Validate a model file"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: one per core)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score source files across the git history of a repository
    #[command(after_help = "\
Exit codes:
  0  success
  1  the run failed (missing model, inaccessible repository, bad range)
  3  completed, but some units could not be scored or the run was cut short")]
    Score {
        /// Path to the repository (default: current directory)
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Exclusive lower bound, like `git log FROM..TO`
        #[arg(long)]
        from: Option<String>,

        /// Inclusive upper bound (default: HEAD)
        #[arg(long)]
        to: Option<String>,

        /// Report template: text, json, markdown (md), html, csv, or a custom name
        #[arg(long, short = 't')]
        template: Option<String>,

        /// Revision order: newest or oldest
        #[arg(long)]
        order: Option<WalkOrder>,

        /// Unit granularity: file or function
        #[arg(long, short = 'g')]
        granularity: Option<Granularity>,

        /// Score every tracked file at every revision, not only changed ones
        #[arg(long)]
        all_files: bool,

        /// Only walk the newest N revisions of the range
        #[arg(long)]
        max_revisions: Option<usize>,

        /// Stop walking after SECS seconds and report what was scored
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        /// Model file
        #[arg(long, env = "READSCOPE_MODEL")]
        model: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Score working-tree files or directories
    File {
        /// Files or directories (directories are walked, honoring .gitignore)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Score only these lines of a single file, e.g. 10-25
        #[arg(long, value_name = "A-B")]
        lines: Option<file::LineRange>,

        /// Report template
        #[arg(long, short = 't')]
        template: Option<String>,

        /// Unit granularity: file or function
        #[arg(long, short = 'g')]
        granularity: Option<Granularity>,

        /// Model file
        #[arg(long, env = "READSCOPE_MODEL")]
        model: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print ranked readability improvements for each function of a file
    Hints {
        file: PathBuf,

        /// Hints shown per function
        #[arg(long, default_value = "3")]
        top: usize,

        /// Model file
        #[arg(long, env = "READSCOPE_MODEL")]
        model: Option<PathBuf>,
    },

    /// Show the active model, or validate a model file
    Model {
        /// Validate this model file instead of showing the active one
        #[arg(long, value_name = "PATH")]
        check: Option<PathBuf>,

        /// Model file
        #[arg(long, env = "READSCOPE_MODEL")]
        model: Option<PathBuf>,
    },
}

/// Run the parsed command.
pub fn run(cli: Cli) -> Result<ExitStatus> {
    let flags = settings::Flags {
        workers: cli.workers,
        ..Default::default()
    };

    match cli.command {
        Commands::Score {
            repo,
            from,
            to,
            template,
            order,
            granularity,
            all_files,
            max_revisions,
            time_limit,
            model,
            output,
        } => score::run(score::ScoreArgs {
            repo,
            from,
            to,
            all_files,
            time_limit,
            output,
            flags: settings::Flags {
                template,
                order,
                granularity,
                max_revisions,
                model,
                ..flags
            },
        }),

        Commands::File {
            paths,
            lines,
            template,
            granularity,
            model,
            output,
        } => file::run(
            &paths,
            lines,
            output.as_deref(),
            settings::Flags {
                template,
                granularity,
                model,
                ..flags
            },
        ),

        Commands::Hints { file, top, model } => hints::run(
            &file,
            top,
            settings::Flags { model, ..flags },
        ),

        Commands::Model { check, model } => {
            model::run(check.as_deref(), settings::Flags { model, ..flags })
        }
    }
}
