//! Built-in configuration templates.
//!
//! Templates keep their directories workspace-relative. Callers get an owned,
//! resolved copy from [`Preset::instantiate`]; the catalog itself is never
//! handed out mutably.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::{SetupConfig, TerminalSpec};
use crate::detect::ProjectType;

/// Preset used when nothing else applies: one terminal for `npm run dev`,
/// one for `npm run serve`.
pub const FALLBACK_PRESET: &str = "dev-serve";

/// Terminal names in the `monorepo` preset whose directories follow the
/// detected layout.
pub const MONOREPO_CLIENT: &str = "Client";
pub const MONOREPO_SERVER: &str = "Server";

#[derive(Debug)]
pub struct Preset {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    template: SetupConfig,
}

impl Preset {
    pub fn template(&self) -> &SetupConfig {
        &self.template
    }

    /// An owned copy with directories resolved against `workspace_root`.
    pub fn instantiate(&self, workspace_root: &Path) -> SetupConfig {
        let mut config = self.template.clone();
        config.resolve_directories(workspace_root);
        config
    }
}

static CATALOG: LazyLock<Vec<Preset>> = LazyLock::new(build_catalog);

/// The full catalog, in display order.
pub fn list_presets() -> &'static [Preset] {
    &CATALOG
}

/// Look a preset up by key or label, ignoring case.
pub fn find(key: &str) -> Option<&'static Preset> {
    let key = key.trim();
    list_presets()
        .iter()
        .find(|p| p.key.eq_ignore_ascii_case(key) || p.label.eq_ignore_ascii_case(key))
}

/// The preset a detected project type starts from.
pub fn for_project(project: ProjectType) -> Option<&'static Preset> {
    find(project.preset_key())
}

fn preset(
    key: &'static str,
    label: &'static str,
    description: &'static str,
    terminals: Vec<TerminalSpec>,
) -> Preset {
    Preset {
        key,
        label,
        description,
        template: SetupConfig {
            name: label.to_string(),
            description: Some(description.to_string()),
            version: None,
            environment: BTreeMap::new(),
            terminals,
        },
    }
}

fn manual(mut spec: TerminalSpec) -> TerminalSpec {
    spec.auto_start = Some(false);
    spec
}

fn laravel_terminals(vite_label: &str) -> Vec<TerminalSpec> {
    vec![
        TerminalSpec::new("Artisan", ".", "php artisan serve")
            .with_color("red")
            .with_icon("server"),
        TerminalSpec::new(vite_label, ".", "npm run dev")
            .with_color("cyan")
            .with_icon("browser"),
        manual(
            TerminalSpec::new("Queue", ".", "php artisan queue:work")
                .with_color("yellow")
                .with_icon("list-ordered"),
        ),
        TerminalSpec::new("Logs", ".", "tail -f storage/logs/laravel.log")
            .with_color("white")
            .with_icon("output")
            .with_delay(2000),
    ]
}

fn build_catalog() -> Vec<Preset> {
    vec![
        preset(
            FALLBACK_PRESET,
            "Dev + Serve",
            "npm run dev and npm run serve side by side",
            vec![
                TerminalSpec::new("Dev Terminal", ".", "npm run dev").with_color("cyan"),
                TerminalSpec::new("Serve Terminal", ".", "npm run serve").with_color("green"),
            ],
        ),
        preset(
            "laravel",
            "Laravel",
            "Artisan server, Vite, queue worker and log tail",
            laravel_terminals("Vite"),
        ),
        preset(
            "laravel-react",
            "Laravel + React",
            "Laravel with a React front end built by Vite",
            laravel_terminals("React (Vite)"),
        ),
        preset(
            "laravel-vue",
            "Laravel + Vue",
            "Laravel with a Vue front end built by Vite",
            laravel_terminals("Vue (Vite)"),
        ),
        preset(
            "nextjs",
            "Next.js",
            "Next.js development server",
            vec![TerminalSpec::new("Next.js", ".", "npm run dev")
                .with_color("white")
                .with_icon("browser")],
        ),
        preset(
            "nextjs-express",
            "Next.js + Express",
            "Next.js front end in ./frontend, Express API in ./backend",
            vec![
                TerminalSpec::new("Frontend", "./frontend", "npm run dev")
                    .with_color("cyan")
                    .with_icon("browser"),
                TerminalSpec::new("Backend", "./backend", "npm run dev")
                    .with_color("green")
                    .with_icon("server"),
            ],
        ),
        preset(
            "nuxt",
            "Nuxt",
            "Nuxt development server",
            vec![TerminalSpec::new("Nuxt", ".", "npm run dev")
                .with_color("green")
                .with_icon("browser")],
        ),
        preset(
            "mern",
            "MERN",
            "React client, Express server and a local MongoDB",
            vec![
                manual(
                    TerminalSpec::new("MongoDB", ".", "mongod --dbpath ./data/db")
                        .with_color("green")
                        .with_icon("database"),
                ),
                TerminalSpec::new("Server", "./server", "npm run dev")
                    .with_color("yellow")
                    .with_icon("server"),
                TerminalSpec::new("Client", "./client", "npm start")
                    .with_color("cyan")
                    .with_icon("browser")
                    .with_delay(1000),
            ],
        ),
        preset(
            "docker-compose",
            "Docker Compose",
            "docker compose up with a delayed log follower",
            vec![
                TerminalSpec::new("Compose", ".", "docker compose up")
                    .with_color("blue")
                    .with_icon("package"),
                TerminalSpec::new("Compose Logs", ".", "docker compose logs -f")
                    .with_color("white")
                    .with_icon("output")
                    .with_delay(3000),
            ],
        ),
        preset(
            "django",
            "Django",
            "Django development server with an optional Celery worker",
            vec![
                TerminalSpec::new("Django", ".", "python manage.py runserver")
                    .with_color("green")
                    .with_icon("server"),
                manual(
                    TerminalSpec::new("Celery", ".", "celery -A config worker -l info")
                        .with_color("yellow")
                        .with_icon("gear"),
                ),
            ],
        ),
        preset(
            "monorepo",
            "Client/server monorepo",
            "npm run dev in ./client and ./server",
            vec![
                TerminalSpec::new(MONOREPO_CLIENT, "./client", "npm run dev")
                    .with_color("cyan")
                    .with_icon("browser"),
                TerminalSpec::new(MONOREPO_SERVER, "./server", "npm run dev")
                    .with_color("green")
                    .with_icon("server"),
            ],
        ),
    ]
}
