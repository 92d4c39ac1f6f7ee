use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User-level settings for the `ryo` tool itself, loaded from TOML.
///
/// Project layout lives in `ryosetup.json`; this file only tunes how
/// terminals are hosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shell to run in each terminal. Falls back to `$SHELL`, then `/bin/sh`.
    pub shell: Option<String>,
    /// Pause between stopping and starting again in a full restart.
    pub restart_pause_ms: u64,
    /// Preset key used when no configuration file is found and nothing is
    /// detected.
    pub default_preset: Option<String>,
    pub rows: u16,
    pub cols: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: None,
            restart_pause_ms: 500,
            default_preset: None,
            rows: 24,
            cols: 120,
        }
    }
}

impl Settings {
    /// `<config dir>/ryo/settings.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ryo").join("settings.toml"))
    }

    /// Load settings from a TOML file path. Returns None if file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, SettingsError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::ReadFailed(path.to_path_buf(), e))?;
        let settings: Self =
            toml::from_str(&contents).map_err(|e| SettingsError::ParseFailed(path.to_path_buf(), e))?;
        Ok(Some(settings))
    }

    /// Save settings to a TOML file path.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::WriteFailed(path.to_path_buf(), e))?;
        }
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| SettingsError::WriteFailed(path.to_path_buf(), e))?;
        Ok(())
    }

    /// The TOML text `save` writes.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(SettingsError::SerializeFailed)
    }

    pub fn shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }
}

/// Errors that can occur when loading or saving settings.
#[derive(Debug)]
pub enum SettingsError {
    ReadFailed(PathBuf, std::io::Error),
    ParseFailed(PathBuf, toml::de::Error),
    WriteFailed(PathBuf, std::io::Error),
    SerializeFailed(toml::ser::Error),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read settings {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse settings {}: {}", path.display(), e)
            }
            Self::WriteFailed(path, e) => {
                write!(f, "Failed to write settings {}: {}", path.display(), e)
            }
            Self::SerializeFailed(e) => write!(f, "Failed to serialize settings: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_settings() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.restart_pause(), Duration::from_millis(500));
    }

    #[test]
    fn parse_partial_settings() {
        let toml = r#"
            shell = "/bin/zsh"
            default_preset = "laravel"
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.shell(), "/bin/zsh");
        assert_eq!(settings.default_preset.as_deref(), Some("laravel"));
        assert_eq!(settings.rows, 24);
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load(&dir.path().join("settings.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "restart_pause_ms = \"soon\"").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::ParseFailed(..)));
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn to_toml_round_trips() {
        let settings = Settings {
            default_preset: Some("django".into()),
            ..Default::default()
        };
        let text = settings.to_toml().unwrap();
        assert!(text.contains("default_preset = \"django\""));
        assert!(text.contains("restart_pause_ms = 500"));
        assert_eq!(toml::from_str::<Settings>(&text).unwrap(), settings);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            shell: Some("/bin/bash".into()),
            restart_pause_ms: 1200,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), Some(settings));
    }
}
