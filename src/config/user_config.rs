//! User-level configuration for readscope
//!
//! Loaded from `~/.config/readscope/config.toml` (platform config dir).
//! The same directory is probed for a `readability_model` file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserConfig {
    /// Model file used when neither the flag nor the project config names one
    pub model: Option<PathBuf>,

    /// Template directory used when the project config has none
    pub template_dir: Option<PathBuf>,

    /// Default template name
    pub template: Option<String>,
}

impl UserConfig {
    /// Load the user config, returning defaults when it is absent or invalid.
    pub fn load() -> Self {
        match Self::user_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str::<UserConfig>(&content) {
            Ok(config) => {
                debug!("Loaded user config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring invalid user config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// The user config directory
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("readscope"))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_parsing() {
        let config: UserConfig = toml::from_str(
            r#"
model = "/opt/models/readability_model"
template_dir = "/opt/templates"
"#,
        )
        .unwrap();
        assert_eq!(config.model, Some(PathBuf::from("/opt/models/readability_model")));
        assert_eq!(config.template_dir, Some(PathBuf::from("/opt/templates")));
        assert_eq!(config.template, None);
    }

    #[test]
    fn test_missing_or_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(UserConfig::load_from(&dir.path().join("nope.toml")), UserConfig::default());

        let bad = dir.path().join("config.toml");
        std::fs::write(&bad, "this is [[ not valid toml").unwrap();
        assert_eq!(UserConfig::load_from(&bad), UserConfig::default());
    }

    #[test]
    fn test_user_config_path() {
        if let Some(p) = UserConfig::user_config_path() {
            assert!(p.ends_with("readscope/config.toml"));
        }
    }
}
