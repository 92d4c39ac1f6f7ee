//! Pick the configuration to start for a workspace.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{self, ConfigError, SetupConfig};
use crate::detect::{self, MonorepoLayout, ProjectType};
use crate::presets::{self, FALLBACK_PRESET};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown preset: {0} (see `ryo presets`)")]
    UnknownPreset(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where a resolved configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Preset(&'static str),
    Detected(ProjectType, &'static str),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Preset(key) => write!(f, "preset {key}"),
            Self::Detected(project, key) => write!(f, "detected {project} (preset {key})"),
        }
    }
}

/// What the caller asked for; every field is optional.
#[derive(Debug, Default, Clone)]
pub struct Request<'a> {
    pub preset: Option<&'a str>,
    pub config_file: Option<&'a Path>,
    pub default_preset: Option<&'a str>,
}

/// Resolution order: explicit preset, explicit file, discovered file,
/// detected project type, configured default preset, then the built-in
/// dev/serve pair.
pub fn resolve(
    workspace_root: &Path,
    request: &Request<'_>,
) -> Result<(SetupConfig, ConfigSource), ResolveError> {
    if let Some(key) = request.preset {
        let preset = presets::find(key).ok_or_else(|| ResolveError::UnknownPreset(key.to_string()))?;
        return Ok((preset.instantiate(workspace_root), ConfigSource::Preset(preset.key)));
    }

    let file = request
        .config_file
        .map(Path::to_path_buf)
        .or_else(|| config::discover(workspace_root));
    if let Some(path) = file {
        let config = config::load(&path, workspace_root)?;
        return Ok((config, ConfigSource::File(path)));
    }

    if let Some(project) = detect::detect(workspace_root) {
        if let Some((config, key)) = instantiate_detected(project, workspace_root) {
            return Ok((config, ConfigSource::Detected(project, key)));
        }
    }

    let key = request.default_preset.unwrap_or(FALLBACK_PRESET);
    let preset = presets::find(key).ok_or_else(|| ResolveError::UnknownPreset(key.to_string()))?;
    Ok((preset.instantiate(workspace_root), ConfigSource::Preset(preset.key)))
}

/// Instantiate the preset for a detected project type, fitted to the
/// workspace where the preset's layout varies between projects.
pub fn instantiate_detected(
    project: ProjectType,
    workspace_root: &Path,
) -> Option<(SetupConfig, &'static str)> {
    let preset = presets::for_project(project)?;
    let mut config = preset.instantiate(workspace_root);
    if project == ProjectType::Monorepo {
        if let Some(layout) = MonorepoLayout::scan(workspace_root) {
            for spec in &mut config.terminals {
                let dir = match spec.name.as_str() {
                    presets::MONOREPO_CLIENT => layout.client,
                    presets::MONOREPO_SERVER => layout.server,
                    _ => continue,
                };
                spec.directory = config::resolve_directory(Path::new(dir), workspace_root);
            }
            tracing::debug!(client = layout.client, server = layout.server, "monorepo layout");
        }
    }
    Some((config, preset.key))
}
