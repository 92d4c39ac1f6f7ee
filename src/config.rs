//! Project configuration: the `ryosetup.json` schema, its parser, file
//! discovery in a workspace root, and the canonical writer.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File names searched for in the workspace root, in priority order.
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "ryosetup.json",
    "ryosetup.jsonc",
    ".ryosetup.json",
    "ryosetup",
];

/// Name written by [`save`] when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ryosetup.json";

/// Name given to configurations read from the legacy plain-text format.
pub const LEGACY_CONFIG_NAME: &str = "Legacy Config";

const LEGACY_DEFAULT_FRONTEND_CMD: &str = "npm run dev";
const LEGACY_DEFAULT_BACKEND_CMD: &str = "npm run serve";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One requested terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSpec {
    /// Registry key; unique within a configuration.
    pub name: String,
    /// Working directory. Absolute once the configuration has been parsed.
    pub directory: PathBuf,
    /// Command line sent to the shell once the terminal exists.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
    /// Milliseconds to wait before sending `command`. Fractions round to
    /// the nearest millisecond.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_delay"
    )]
    pub delay: Option<u64>,
}

impl TerminalSpec {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            command: command.into(),
            color: None,
            icon: None,
            auto_start: None,
            delay: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Some(millis);
        self
    }

    /// Absent means true.
    pub fn auto_start(&self) -> bool {
        self.auto_start.unwrap_or(true)
    }

    /// The send delay, only when it is strictly positive.
    pub fn send_delay(&self) -> Option<Duration> {
        match self.delay {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }
}

fn deserialize_delay<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(ms) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if !ms.is_finite() || ms < 0.0 {
        return Err(de::Error::custom(format!(
            "delay must be a non-negative number of milliseconds, got {ms}"
        )));
    }
    Ok(Some(ms.round() as u64))
}

/// A parsed, normalized configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    pub terminals: Vec<TerminalSpec>,
}

impl SetupConfig {
    /// Check the invariants serde cannot express. The configuration name
    /// is only a label and may be empty, as may `terminals`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (i, spec) in self.terminals.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "terminals[{i}].name must not be empty"
                )));
            }
            // Two specs with one name would leave the first handle orphaned
            // in the registry.
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate terminal name: {}",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Resolve every directory against `workspace_root`.
    pub fn resolve_directories(&mut self, workspace_root: &Path) {
        for spec in &mut self.terminals {
            spec.directory = resolve_directory(&spec.directory, workspace_root);
        }
    }

    pub fn terminal(&self, name: &str) -> Option<&TerminalSpec> {
        self.terminals.iter().find(|t| t.name == name)
    }
}

/// Parse file contents into a normalized configuration.
///
/// Content whose first significant character is `{` is JSON (with `//` and
/// `/* */` comments allowed); anything else is the legacy line format.
pub fn parse(contents: &str, workspace_root: &Path) -> Result<SetupConfig, ConfigError> {
    let mut config = match json_body(contents)? {
        Some(json) => serde_json::from_str::<SetupConfig>(&json)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?,
        None => parse_legacy(contents)?,
    };
    config.validate()?;
    config.resolve_directories(workspace_root);
    Ok(config)
}

/// The comment-free JSON text, or `None` for legacy content.
///
/// Legacy commands may contain `/*` or `//` (shell globs, URLs), so a
/// stripping failure only counts when the raw text itself opens with `{`.
fn json_body(contents: &str) -> Result<Option<String>, ConfigError> {
    match strip_comments(contents) {
        Ok(stripped) if stripped.trim_start().starts_with('{') => Ok(Some(stripped)),
        Ok(_) => Ok(None),
        Err(e) if contents.trim_start().starts_with('{') => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "comment stripping failed, reading as legacy");
            Ok(None)
        }
    }
}

fn strip_comments(contents: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(contents.len());
    json_comments::CommentSettings::c_style()
        .strip_comments(contents.as_bytes())
        .read_to_string(&mut out)
        .map_err(|e| ConfigError::InvalidConfig(format!("unreadable content: {e}")))?;
    Ok(out)
}

/// Legacy format: significant lines are frontend dir, backend dir, then
/// optionally frontend and backend commands.
fn parse_legacy(contents: &str) -> Result<SetupConfig, ConfigError> {
    let lines: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let (frontend_cmd, backend_cmd) = match lines.len() {
        0 | 1 => {
            return Err(ConfigError::InvalidConfig(format!(
                "legacy configuration needs at least 2 lines, found {}",
                lines.len()
            )))
        }
        2 | 3 => (LEGACY_DEFAULT_FRONTEND_CMD, LEGACY_DEFAULT_BACKEND_CMD),
        _ => (lines[2], lines[3]),
    };

    Ok(SetupConfig {
        name: LEGACY_CONFIG_NAME.to_string(),
        description: None,
        version: None,
        environment: BTreeMap::new(),
        terminals: vec![
            TerminalSpec::new("Frontend", lines[0], frontend_cmd)
                .with_color("cyan")
                .with_icon("browser"),
            TerminalSpec::new("Backend", lines[1], backend_cmd)
                .with_color("green")
                .with_icon("server"),
        ],
    })
}

/// Expand `~`, join relative paths onto `workspace_root`, and fold `.` and
/// `..` components.
pub fn resolve_directory(dir: &Path, workspace_root: &Path) -> PathBuf {
    let raw = dir.to_string_lossy();
    let expanded = PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref());
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        workspace_root.join(expanded)
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }
    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// Directory as written to disk: relative to the root when under it.
fn relativize(dir: &Path, workspace_root: &Path) -> PathBuf {
    match dir.strip_prefix(workspace_root) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Ok(rel) => Path::new(".").join(rel),
        Err(_) => dir.to_path_buf(),
    }
}

/// Search the workspace root (non-recursively) for a configuration file.
///
/// Listing errors are logged and treated as "no file".
pub fn discover(workspace_root: &Path) -> Option<PathBuf> {
    for name in CONFIG_FILE_NAMES {
        let candidate = workspace_root.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let entries = match std::fs::read_dir(workspace_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(?e, root = %workspace_root.display(), "cannot list workspace root");
            return None;
        }
    };
    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .starts_with("ryosetup")
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Read and parse a configuration file.
pub fn load(path: &Path, workspace_root: &Path) -> Result<SetupConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, workspace_root)
}

/// Canonical JSON form, with directories relative to the workspace root
/// where possible.
pub fn to_canonical_json(config: &SetupConfig, workspace_root: &Path) -> Result<String, ConfigError> {
    let mut on_disk = config.clone();
    for spec in &mut on_disk.terminals {
        spec.directory = relativize(&spec.directory, workspace_root);
    }
    let mut out = serde_json::to_string_pretty(&on_disk)?;
    out.push('\n');
    Ok(out)
}

/// Write the canonical form to `path`.
pub fn save(config: &SetupConfig, workspace_root: &Path, path: &Path) -> Result<(), ConfigError> {
    let contents = to_canonical_json(config, workspace_root)?;
    std::fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/work/app")
    }

    #[test]
    fn parse_minimal_json() {
        let json = r#"{
            "name": "App",
            "terminals": [
                { "name": "Web", "directory": "./web", "command": "npm run dev" }
            ]
        }"#;
        let config = parse(json, &root()).unwrap();
        assert_eq!(config.name, "App");
        assert_eq!(config.terminals.len(), 1);
        assert_eq!(config.terminals[0].directory, PathBuf::from("/work/app/web"));
        assert!(config.terminals[0].auto_start());
        assert!(config.terminals[0].send_delay().is_none());
        assert!(config.environment.is_empty());
    }

    #[test]
    fn parse_full_json_with_comments() {
        let json = r#"
        // project setup
        {
            "name": "Full",
            "description": "everything", /* inline */
            "version": "2.0",
            "environment": { "APP_ENV": "local" },
            "terminals": [
                {
                    "name": "Api",
                    "directory": "/srv/api",
                    "command": "curl http://localhost:8000 // not a comment",
                    "color": "green",
                    "icon": "server",
                    "autoStart": false,
                    "delay": 250
                }
            ]
        }"#;
        let config = parse(json, &root()).unwrap();
        let api = &config.terminals[0];
        assert_eq!(api.directory, PathBuf::from("/srv/api"));
        assert_eq!(api.command, "curl http://localhost:8000 // not a comment");
        assert!(!api.auto_start());
        assert_eq!(api.send_delay(), Some(Duration::from_millis(250)));
        assert_eq!(config.environment.get("APP_ENV").map(String::as_str), Some("local"));
        assert_eq!(config.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn zero_delay_means_immediate() {
        let spec = TerminalSpec::new("a", ".", "x").with_delay(0);
        assert!(spec.send_delay().is_none());
    }

    #[test]
    fn json_missing_field_is_invalid() {
        let json = r#"{ "name": "x", "terminals": [ { "name": "a", "directory": "." } ] }"#;
        let err = parse(json, &root()).unwrap_err();
        match err {
            ConfigError::InvalidConfig(reason) => assert!(reason.contains("command"), "{reason}"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn json_wrong_type_is_invalid() {
        let json = r#"{ "name": "x", "terminals": [ { "name": "a", "directory": ".", "command": "c", "delay": -5 } ] }"#;
        assert!(matches!(parse(json, &root()), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let json = r#"{ "name": "x", "terminals": [
            { "name": "a", "directory": ".", "command": "one" },
            { "name": "a", "directory": ".", "command": "two" }
        ] }"#;
        let err = parse(json, &root()).unwrap_err();
        assert!(err.to_string().contains("duplicate terminal name: a"), "{err}");
    }

    #[test]
    fn empty_terminal_name_is_rejected() {
        let json = r#"{ "name": "x", "terminals": [ { "name": " ", "directory": ".", "command": "c" } ] }"#;
        assert!(matches!(parse(json, &root()), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn legacy_four_lines() {
        let legacy = "./fe\n./be\nnpm run dev\nphp artisan serve\n";
        let config = parse(legacy, &root()).unwrap();
        assert_eq!(config.name, LEGACY_CONFIG_NAME);
        assert_eq!(config.terminals.len(), 2);
        let (fe, be) = (&config.terminals[0], &config.terminals[1]);
        assert_eq!(fe.directory, PathBuf::from("/work/app/fe"));
        assert_eq!(be.directory, PathBuf::from("/work/app/be"));
        assert_eq!(fe.command, "npm run dev");
        assert_eq!(be.command, "php artisan serve");
        assert_ne!(fe.color, be.color);
    }

    #[test]
    fn legacy_skips_comments_and_blank_lines() {
        let legacy = "# frontend first\n\n  ./fe  \n# then backend\n./be\n";
        let config = parse(legacy, &root()).unwrap();
        assert_eq!(config.terminals[0].directory, PathBuf::from("/work/app/fe"));
        assert_eq!(config.terminals[0].command, LEGACY_DEFAULT_FRONTEND_CMD);
        assert_eq!(config.terminals[1].command, LEGACY_DEFAULT_BACKEND_CMD);
    }

    #[test]
    fn legacy_commands_may_contain_comment_markers() {
        let legacy = "./fe\n./be\nnpm run lint -- src/*.ts\ncurl http://localhost:8000 // ping\n";
        let config = parse(legacy, &root()).unwrap();
        assert_eq!(config.name, LEGACY_CONFIG_NAME);
        assert_eq!(config.terminals[0].command, "npm run lint -- src/*.ts");
        assert_eq!(config.terminals[1].command, "curl http://localhost:8000 // ping");
    }

    #[test]
    fn legacy_with_closed_block_marker_stays_legacy() {
        let legacy = "./fe\n./be\nls src/*.ts */dist\nphp artisan serve\n";
        let config = parse(legacy, &root()).unwrap();
        assert_eq!(config.terminals[0].command, "ls src/*.ts */dist");
    }

    #[test]
    fn json_with_unterminated_comment_is_invalid() {
        let json = r#"{ "name": "x", /* oops "terminals": [] }"#;
        assert!(matches!(parse(json, &root()), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn empty_name_and_terminals_are_accepted() {
        let config = parse(r#"{ "name": "", "terminals": [] }"#, &root()).unwrap();
        assert!(config.name.is_empty());
        assert!(config.terminals.is_empty());
    }

    #[test]
    fn fractional_delay_rounds_to_millis() {
        let json = r#"{ "name": "x", "terminals": [
            { "name": "a", "directory": ".", "command": "c", "delay": 500.0 },
            { "name": "b", "directory": ".", "command": "c", "delay": 12.6 }
        ] }"#;
        let config = parse(json, &root()).unwrap();
        assert_eq!(config.terminals[0].delay, Some(500));
        assert_eq!(config.terminals[1].send_delay(), Some(Duration::from_millis(13)));
    }

    #[test]
    fn legacy_too_short() {
        let err = parse("# only a comment\n./fe\n", &root()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
        assert!(matches!(parse("", &root()), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn resolve_folds_dot_components() {
        let resolved = resolve_directory(Path::new("./api/../web/./src"), &root());
        assert_eq!(resolved, PathBuf::from("/work/app/web/src"));
        assert_eq!(resolve_directory(Path::new("."), &root()), root());
        assert_eq!(resolve_directory(Path::new("../shared"), &root()), PathBuf::from("/work/shared"));
    }

    #[test]
    fn canonical_json_relativizes_directories() {
        let mut config = SetupConfig {
            name: "Round".into(),
            description: None,
            version: None,
            environment: BTreeMap::new(),
            terminals: vec![
                TerminalSpec::new("in", "/work/app/web", "a"),
                TerminalSpec::new("root", "/work/app", "b"),
                TerminalSpec::new("out", "/elsewhere/api", "c"),
            ],
        };
        config.validate().unwrap();
        let json = to_canonical_json(&config, &root()).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(raw["terminals"][0]["directory"], "./web");
        assert_eq!(raw["terminals"][1]["directory"], ".");
        assert_eq!(raw["terminals"][2]["directory"], "/elsewhere/api");
        assert!(raw["terminals"][0].get("autoStart").is_none());

        let reparsed = parse(&json, &root()).unwrap();
        assert_eq!(reparsed, config);
        config.terminals[0].auto_start = Some(false);
        let reparsed = parse(&to_canonical_json(&config, &root()).unwrap(), &root()).unwrap();
        assert_eq!(reparsed.terminals[0].auto_start, Some(false));
    }

    #[test]
    fn discover_prefers_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path()).is_none());

        std::fs::write(dir.path().join("RyoSetup.old"), "a\nb\n").unwrap();
        assert_eq!(discover(dir.path()), Some(dir.path().join("RyoSetup.old")));

        std::fs::write(dir.path().join("ryosetup"), "a\nb\n").unwrap();
        assert_eq!(discover(dir.path()), Some(dir.path().join("ryosetup")));

        std::fs::write(dir.path().join(".ryosetup.json"), "{}").unwrap();
        assert_eq!(discover(dir.path()), Some(dir.path().join(".ryosetup.json")));

        std::fs::write(dir.path().join("ryosetup.json"), "{}").unwrap();
        assert_eq!(discover(dir.path()), Some(dir.path().join("ryosetup.json")));
    }

    #[test]
    fn discover_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ryosetup-assets")).unwrap();
        assert!(discover(dir.path()).is_none());
    }

    #[test]
    fn discover_missing_root_is_none() {
        assert!(discover(Path::new("/definitely/not/a/workspace")).is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let config = SetupConfig {
            name: "Saved".into(),
            description: Some("d".into()),
            version: None,
            environment: BTreeMap::from([("A".to_string(), "1".to_string())]),
            terminals: vec![TerminalSpec::new("web", root.join("web"), "npm start").with_delay(100)],
        };
        let path = root.join(DEFAULT_CONFIG_FILE);
        save(&config, root, &path).unwrap();
        assert_eq!(load(&path, root).unwrap(), config);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = load(Path::new("/no/such/ryosetup.json"), &root()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
