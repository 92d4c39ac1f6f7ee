//! Best-effort guess of a workspace's project type from the files in its
//! root. Only used to pick a default preset, so every filesystem error
//! degrades to "unknown".

use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectType {
    LaravelReact,
    LaravelVue,
    Laravel,
    NextJs,
    Nuxt,
    DockerCompose,
    Django,
    Monorepo,
}

impl ProjectType {
    pub fn label(self) -> &'static str {
        match self {
            Self::LaravelReact => "Laravel + React",
            Self::LaravelVue => "Laravel + Vue",
            Self::Laravel => "Laravel",
            Self::NextJs => "Next.js",
            Self::Nuxt => "Nuxt",
            Self::DockerCompose => "Docker Compose",
            Self::Django => "Django",
            Self::Monorepo => "Client/server monorepo",
        }
    }

    /// Key of the preset this project type starts from.
    pub fn preset_key(self) -> &'static str {
        match self {
            Self::LaravelReact => "laravel-react",
            Self::LaravelVue => "laravel-vue",
            Self::Laravel => "laravel",
            Self::NextJs => "nextjs",
            Self::Nuxt => "nuxt",
            Self::DockerCompose => "docker-compose",
            Self::Django => "django",
            Self::Monorepo => "monorepo",
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const NEXT_CONFIGS: &[&str] = &["next.config.js", "next.config.mjs", "next.config.ts"];
const NUXT_CONFIGS: &[&str] = &["nuxt.config.js", "nuxt.config.ts", "nuxt.config.mjs"];
const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];
const CLIENT_DIRS: &[&'static str] = &["client", "frontend", "web", "ui"];
const SERVER_DIRS: &[&'static str] = &["server", "backend", "api"];

/// One level of a workspace root, read once per detection.
#[derive(Debug, Default)]
pub struct RootListing {
    files: HashSet<String>,
    dirs: HashSet<String>,
    dependencies: HashSet<String>,
}

impl RootListing {
    /// List `root`. `None` when the directory cannot be read.
    pub fn scan(root: &Path) -> Option<Self> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(?e, root = %root.display(), "cannot list workspace root");
                return None;
            }
        };
        let mut listing = Self::default();
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                listing.dirs.insert(name);
            } else {
                listing.files.insert(name);
            }
        }
        if listing.has_file("package.json") {
            listing.dependencies = read_dependencies(&root.join("package.json"));
        }
        Some(listing)
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn has_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    fn has_any_file(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_file(n))
    }

    fn has_any_dir(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_dir(n))
    }

    fn first_dir(&self, names: &[&'static str]) -> Option<&'static str> {
        names.iter().copied().find(|n| self.has_dir(n))
    }

    /// Listed in `dependencies` or `devDependencies` of the root package.json.
    pub fn depends_on(&self, package: &str) -> bool {
        self.dependencies.contains(package)
    }
}

fn read_dependencies(path: &Path) -> HashSet<String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return HashSet::new();
    };
    let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&contents) else {
        tracing::debug!(path = %path.display(), "package.json is not valid JSON");
        return HashSet::new();
    };
    ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|section| pkg.get(section).and_then(|v| v.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

/// A single detection rule: a predicate over the root listing.
pub struct Rule {
    pub project_type: ProjectType,
    pub matches: fn(&RootListing) -> bool,
}

fn is_laravel(root: &RootListing) -> bool {
    root.has_file("artisan") && root.has_file("composer.json")
}

/// Evaluated in order; the first match wins.
pub const RULES: &[Rule] = &[
    Rule {
        project_type: ProjectType::LaravelReact,
        matches: |root| is_laravel(root) && root.depends_on("react"),
    },
    Rule {
        project_type: ProjectType::LaravelVue,
        matches: |root| is_laravel(root) && root.depends_on("vue"),
    },
    Rule {
        project_type: ProjectType::Laravel,
        matches: is_laravel,
    },
    Rule {
        project_type: ProjectType::NextJs,
        matches: |root| root.has_any_file(NEXT_CONFIGS),
    },
    Rule {
        project_type: ProjectType::Nuxt,
        matches: |root| root.has_any_file(NUXT_CONFIGS),
    },
    Rule {
        project_type: ProjectType::DockerCompose,
        matches: |root| root.has_any_file(COMPOSE_FILES),
    },
    Rule {
        project_type: ProjectType::Django,
        matches: |root| root.has_file("manage.py"),
    },
    Rule {
        project_type: ProjectType::Monorepo,
        matches: |root| root.has_any_dir(CLIENT_DIRS) && root.has_any_dir(SERVER_DIRS),
    },
];

/// Directories a client/server monorepo actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonorepoLayout {
    pub client: &'static str,
    pub server: &'static str,
}

impl MonorepoLayout {
    /// First client and first server directory present, in the order
    /// `client, frontend, web, ui` and `server, backend, api`.
    pub fn scan(root: &Path) -> Option<Self> {
        let listing = RootListing::scan(root)?;
        Some(Self {
            client: listing.first_dir(CLIENT_DIRS)?,
            server: listing.first_dir(SERVER_DIRS)?,
        })
    }
}

/// Guess the project type of `root`. Recomputed on every call.
pub fn detect(root: &Path) -> Option<ProjectType> {
    let listing = RootListing::scan(root)?;
    let found = RULES
        .iter()
        .find(|rule| (rule.matches)(&listing))
        .map(|rule| rule.project_type);
    tracing::debug!(root = %root.display(), ?found, "project detection");
    found
}
