//! readscope - code readability scoring
//!
//! Scores source files, functions and whole git histories with a versioned
//! linear readability model.
//!
//! The pieces, leaf first:
//! - [`features`] turns a [`models::SourceUnit`] into a [`models::FeatureVector`]
//! - [`model`] maps a feature vector to a bounded score
//! - [`git`] walks revision histories behind [`git::RepositoryAccess`]
//! - [`pipeline`] drives a run and folds outcomes with [`aggregate`]
//! - [`reporters`] renders the resulting [`models::Report`]

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod git;
pub mod model;
pub mod models;
pub mod pipeline;
pub mod reporters;
