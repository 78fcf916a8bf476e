//! Configuration module for readscope
//!
//! This module handles:
//! - Project-level configuration (readscope.toml)
//! - User-level configuration (~/.config/readscope/config.toml)
//!
//! CLI flags override the project config, which overrides the user config.

mod project_config;
mod user_config;

pub use project_config::{
    glob_match, load_project_config, ExcludeConfig, ProjectConfig, CONFIG_FILES,
    DEFAULT_EXCLUDE_PATTERNS,
};
pub use user_config::UserConfig;
