//! Effective run settings
//!
//! CLI flags override the project config, which overrides the user config.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::config::{ProjectConfig, UserConfig};
use crate::git::WalkOrder;
use crate::model::ModelSources;
use crate::pipeline::Granularity;

pub(super) const DEFAULT_TEMPLATE: &str = "text";

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub(super) struct Flags {
    pub template: Option<String>,
    pub order: Option<WalkOrder>,
    pub granularity: Option<Granularity>,
    pub workers: Option<usize>,
    pub max_revisions: Option<usize>,
    pub model: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub(super) struct Settings {
    pub template: String,
    pub template_dir: Option<PathBuf>,
    pub order: WalkOrder,
    pub granularity: Granularity,
    /// 0 for one worker per core
    pub workers: usize,
    pub max_revisions: Option<usize>,
    pub sources: ModelSources,
}

impl Settings {
    /// Merge flags and config files. `root` is probed for a model file.
    pub fn resolve(
        flags: Flags,
        project: &ProjectConfig,
        user: &UserConfig,
        user_dir: Option<PathBuf>,
        root: &Path,
    ) -> Result<Self> {
        let granularity = match flags.granularity {
            Some(g) => g,
            None => project.granularity().map_err(|e| anyhow!(e))?.unwrap_or_default(),
        };
        let order = match flags.order {
            Some(o) => o,
            None => project.order().map_err(|e| anyhow!(e))?.unwrap_or_default(),
        };

        Ok(Self {
            template: flags
                .template
                .or_else(|| project.template.clone())
                .or_else(|| user.template.clone())
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            template_dir: project
                .template_dir_path()
                .or_else(|| user.template_dir.clone()),
            order,
            granularity,
            workers: flags.workers.or(project.workers).unwrap_or(0),
            max_revisions: flags.max_revisions.or(project.max_revisions),
            sources: ModelSources {
                explicit: flags.model,
                project: project.model_path(),
                repository: Some(root.to_path_buf()),
                user: user.model.clone(),
                user_dir,
            },
        })
    }

    /// Load both config layers for `root` and merge them with `flags`.
    pub fn load(flags: Flags, root: &Path) -> Result<(Self, ProjectConfig)> {
        let project = crate::config::load_project_config(root)?;
        let user = UserConfig::load();
        let settings = Self::resolve(flags, &project, &user, UserConfig::config_dir(), root)?;
        Ok((settings, project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_project_config;

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let project = load_project_config(dir.path()).unwrap();
        let settings =
            Settings::resolve(Flags::default(), &project, &UserConfig::default(), None, dir.path())
                .unwrap();
        assert_eq!(settings.template, "text");
        assert_eq!(settings.granularity, Granularity::File);
        assert_eq!(settings.order, WalkOrder::NewestFirst);
        assert_eq!(settings.workers, 0);
        assert_eq!(settings.sources.explicit, None);
        assert_eq!(settings.sources.repository.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("readscope.toml"),
            "template = \"markdown\"\ngranularity = \"function\"\nworkers = 3\nmodel = \"m.json\"\n",
        )
        .unwrap();
        let project = load_project_config(dir.path()).unwrap();
        let user = UserConfig {
            template: Some("csv".into()),
            template_dir: Some("/user/templates".into()),
            model: Some("/user/model.json".into()),
        };

        let settings =
            Settings::resolve(Flags::default(), &project, &user, None, dir.path()).unwrap();
        assert_eq!(settings.template, "markdown");
        assert_eq!(settings.granularity, Granularity::Function);
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.template_dir, Some(PathBuf::from("/user/templates")));
        assert_eq!(settings.sources.project, Some(dir.path().join("m.json")));
        assert_eq!(settings.sources.user, Some(PathBuf::from("/user/model.json")));

        let flags = Flags {
            template: Some("json".into()),
            granularity: Some(Granularity::File),
            workers: Some(1),
            model: Some("cli.json".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(flags, &project, &user, None, dir.path()).unwrap();
        assert_eq!(settings.template, "json");
        assert_eq!(settings.granularity, Granularity::File);
        assert_eq!(settings.workers, 1);
        assert_eq!(settings.sources.explicit, Some(PathBuf::from("cli.json")));
    }
}
