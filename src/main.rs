//! ryo - launch a project's dev and serve terminals.
//!
//! `ryo` (or `ryo up`) resolves a configuration for the workspace, starts
//! its terminals and then reads control commands from stdin until `quit` or
//! Ctrl+C. Terminal output is interleaved on stdout; logs go to stderr.

use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ryo::config::{self, ConfigError, DEFAULT_CONFIG_FILE};
use ryo::control::{ControlCommand, HELP};
use ryo::pty::PtyHost;
use ryo::resolve::{self, Request, ResolveError};
use ryo::session::{SessionManager, StartReport, Toggled};
use ryo::settings::{Settings, SettingsError};
use ryo::wizard::{Wizard, WizardError};
use ryo::{detect, presets};

/// ryo - dev/serve terminal launcher
///
/// Starts the terminals described by the workspace's ryosetup.json, a
/// detected project preset, or the built-in dev/serve pair.
#[derive(ClapParser, Debug)]
#[command(name = "ryo", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, env = "RYO_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to the tool settings file
    #[arg(long, global = true, env = "RYO_SETTINGS")]
    settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the terminals and accept control commands on stdin
    Up {
        /// Use a built-in preset instead of any configuration file
        #[arg(long)]
        preset: Option<String>,

        /// Configuration file to use instead of discovery
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the built-in presets
    Presets,

    /// Print the detected project type
    Detect,

    /// Parse the configuration and print its normalized form
    Check {
        /// Configuration file to check instead of discovery
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective tool settings, or write them to the settings file
    Settings {
        /// Write the effective settings to the settings file
        #[arg(long)]
        write: bool,

        /// Overwrite an existing settings file
        #[arg(long, requires = "write")]
        force: bool,
    },

    /// Write a ryosetup.json from a preset, detection, or an interactive wizard
    Init {
        /// Preset to write
        #[arg(long, conflicts_with = "detect")]
        preset: Option<String>,

        /// Write the preset matching the detected project type
        #[arg(long)]
        detect: bool,

        /// Overwrite an existing ryosetup.json
        #[arg(long)]
        force: bool,
    },
}

#[derive(Error, Debug)]
pub enum RyoError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    Settings(#[from] SettingsError),

    #[error("{0}")]
    Wizard(#[from] WizardError),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),

    #[error("no settings path: pass --settings or set RYO_SETTINGS")]
    NoSettingsPath,

    #[error("no configuration file found in {}", .0.display())]
    NoConfigFile(PathBuf),

    #[error("no known project type detected in {}", .0.display())]
    NothingDetected(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("ryo: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RYO_LOG").unwrap_or_else(|_| "ryo=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<(), RyoError> {
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let workspace = config::resolve_directory(&workspace, &std::env::current_dir()?);
    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Some(Commands::Up { preset, config }) => {
            run_up(&workspace, &settings, preset.as_deref(), config.as_deref()).await
        }
        Some(Commands::Presets) => {
            run_presets();
            Ok(())
        }
        Some(Commands::Detect) => run_detect(&workspace),
        Some(Commands::Check { config }) => run_check(&workspace, config.as_deref()),
        Some(Commands::Settings { write, force }) => {
            run_settings(cli.settings.as_deref(), &settings, write, force)
        }
        Some(Commands::Init { preset, detect, force }) => {
            run_init(&workspace, preset.as_deref(), detect, force)
        }
        None => run_up(&workspace, &settings, None, None).await,
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings, RyoError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Settings::default_path(),
    };
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let settings = Settings::load(&path)?.unwrap_or_default();
    tracing::debug!(path = %path.display(), ?settings, "settings loaded");
    Ok(settings)
}

// ── Up: start terminals and run the control loop ───────────────────

async fn run_up(
    workspace: &Path,
    settings: &Settings,
    preset: Option<&str>,
    config_file: Option<&Path>,
) -> Result<(), RyoError> {
    let request = Request {
        preset,
        config_file,
        default_preset: settings.default_preset.as_deref(),
    };
    let (setup, source) = resolve::resolve(workspace, &request)?;
    eprintln!("ryo: {} from {source}", setup.name);

    let (host, mut closed_rx) = PtyHost::new(settings);
    let mut manager = SessionManager::new(host).with_restart_pause(settings.restart_pause());

    let report = manager.start(setup, workspace);
    print_report(&report);
    eprintln!("{}", manager.status());

    let mut lines = spawn_stdin_reader()?;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            Some(event) = closed_rx.recv() => {
                if manager.on_terminal_closed(&event) {
                    eprintln!("ryo: {} exited", event.name);
                    eprintln!("{}", manager.status());
                }
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match line.parse::<ControlCommand>() {
                    Ok(ControlCommand::Quit) => break,
                    Ok(command) => {
                        handle_command(&mut manager, command, workspace, &request).await;
                    }
                    Err(e) => eprintln!("ryo: {e}"),
                },
                None => {
                    tracing::debug!("stdin closed, waiting for Ctrl+C");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C");
                break;
            }
        }
    }

    manager.shutdown();
    tracing::info!("ryo exiting");
    Ok(())
}

/// Read stdin on a plain thread; a pending tokio stdin read would hold up
/// runtime shutdown after Ctrl+C.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>, RyoError> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("ryo-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(?e, "failed to read stdin");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

async fn handle_command(
    manager: &mut SessionManager<PtyHost>,
    command: ControlCommand,
    workspace: &Path,
    request: &Request<'_>,
) {
    match command {
        ControlCommand::Status => {}
        ControlCommand::List => {
            for name in manager.registry().names() {
                eprintln!("  {name}");
            }
        }
        ControlCommand::Stop => {
            manager.stop_all();
        }
        ControlCommand::Start => match next_config(manager, workspace, request) {
            Ok(setup) => print_report(&manager.start(setup, workspace)),
            Err(e) => eprintln!("ryo: {e}"),
        },
        ControlCommand::Toggle => {
            let setup = match manager.current_config() {
                Some(current) if manager.is_running() => Ok(current.clone()),
                _ => next_config(manager, workspace, request),
            };
            match setup {
                Ok(setup) => {
                    if let Toggled::Started(report) = manager.toggle(setup, workspace) {
                        print_report(&report);
                    }
                }
                Err(e) => eprintln!("ryo: {e}"),
            }
        }
        ControlCommand::Restart(None) => match manager.restart_all().await {
            Ok(report) => print_report(&report),
            Err(e) => eprintln!("ryo: {e}"),
        },
        ControlCommand::Restart(Some(name)) => {
            if let Err(e) = manager.restart_one(&name) {
                eprintln!("ryo: {e}");
            }
        }
        ControlCommand::Help => eprintln!("{HELP}"),
        ControlCommand::Quit => {}
    }
    eprintln!("{}", manager.status());
}

/// Re-read the workspace so edits to ryosetup.json apply on the next start.
fn next_config(
    manager: &SessionManager<PtyHost>,
    workspace: &Path,
    request: &Request<'_>,
) -> Result<ryo::config::SetupConfig, ResolveError> {
    match resolve::resolve(workspace, request) {
        Ok((setup, _)) => Ok(setup),
        Err(e) => match manager.current_config() {
            Some(current) => {
                tracing::warn!(error = %e, "keeping the previous configuration");
                Ok(current.clone())
            }
            None => Err(e),
        },
    }
}

fn print_report(report: &StartReport) {
    for name in &report.started {
        eprintln!("  started  {name}");
    }
    for name in &report.manual {
        eprintln!("  manual   {name} (restart {name} to launch)");
    }
    for skipped in &report.skipped {
        eprintln!("  skipped  {}: {}", skipped.name, skipped.reason);
    }
}

// ── One-shot subcommands ───────────────────────────────────────────

fn run_presets() {
    for preset in presets::list_presets() {
        println!("{:<16} {:<24} {}", preset.key, preset.label, preset.description);
    }
}

fn run_detect(workspace: &Path) -> Result<(), RyoError> {
    let project = detect::detect(workspace).ok_or_else(|| RyoError::NothingDetected(workspace.to_path_buf()))?;
    match presets::for_project(project) {
        Some(preset) => println!("{project} (preset {})", preset.key),
        None => println!("{project}"),
    }
    Ok(())
}

fn run_check(workspace: &Path, config_file: Option<&Path>) -> Result<(), RyoError> {
    let path = match config_file {
        Some(path) => path.to_path_buf(),
        None => config::discover(workspace).ok_or_else(|| RyoError::NoConfigFile(workspace.to_path_buf()))?,
    };
    let setup = config::load(&path, workspace)?;
    eprintln!("ryo: {} is valid", path.display());
    print!("{}", config::to_canonical_json(&setup, workspace)?);
    Ok(())
}

fn run_settings(
    explicit: Option<&Path>,
    settings: &Settings,
    write: bool,
    force: bool,
) -> Result<(), RyoError> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(Settings::default_path)
        .ok_or(RyoError::NoSettingsPath)?;
    if !write {
        eprintln!("ryo: settings file {}", path.display());
        print!("{}", settings.to_toml()?);
        return Ok(());
    }
    if path.exists() && !force {
        return Err(RyoError::ConfigExists(path));
    }
    settings.save(&path)?;
    eprintln!("ryo: wrote {}", path.display());
    tracing::info!(path = %path.display(), "settings written");
    Ok(())
}

fn run_init(workspace: &Path, preset: Option<&str>, detect: bool, force: bool) -> Result<(), RyoError> {
    let path = workspace.join(DEFAULT_CONFIG_FILE);
    if path.exists() && !force {
        return Err(RyoError::ConfigExists(path));
    }

    let setup = if let Some(key) = preset {
        let preset = presets::find(key).ok_or_else(|| ResolveError::UnknownPreset(key.to_string()))?;
        preset.instantiate(workspace)
    } else if detect {
        let project = detect::detect(workspace).ok_or_else(|| RyoError::NothingDetected(workspace.to_path_buf()))?;
        let (setup, _) = resolve::instantiate_detected(project, workspace)
            .ok_or_else(|| ResolveError::UnknownPreset(project.preset_key().to_string()))?;
        eprintln!("ryo: detected {project}");
        setup
    } else {
        let stdin = std::io::stdin();
        let stderr = std::io::stderr();
        Wizard::new(stdin.lock(), stderr.lock()).run(workspace)?
    };

    setup.validate()?;
    config::save(&setup, workspace, &path)?;
    eprintln!("ryo: wrote {}", path.display());
    tracing::info!(path = %path.display(), "configuration written");
    Ok(())
}
