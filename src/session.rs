//! Live terminal sessions: the name-keyed registry and the lifecycle
//! controller that starts, stops and restarts a configuration's terminals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{resolve_directory, SetupConfig, TerminalSpec};
use crate::terminal::{
    HostError, TerminalClosed, TerminalHandle, TerminalHost, TerminalId, TerminalOptions,
    PALETTE,
};

/// Pause used by [`SessionManager::restart_all`] unless overridden.
pub const DEFAULT_RESTART_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("directory for terminal {name} does not exist: {}", directory.display())]
    MissingDirectory { name: String, directory: PathBuf },

    #[error("nothing has been started yet")]
    NoCurrentConfig,

    #[error("no terminal named {0} in the current configuration")]
    UnknownTerminal(String),

    #[error("terminal {name} has a delayed command but no tokio runtime is running")]
    NoRuntime { name: String },

    #[error("failed to open terminal {name}: {source}")]
    Host {
        name: String,
        #[source]
        source: HostError,
    },
}

struct Entry<H> {
    handle: H,
    /// Cancels the scheduled command send, if one is pending.
    pending_send: Option<CancellationToken>,
}

impl<H: TerminalHandle> Entry<H> {
    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending_send.take() {
            token.cancel();
        }
    }
}

/// Live terminals keyed by spec name.
///
/// Running is derived from emptiness on every call; nothing is cached.
pub struct SessionRegistry<H> {
    entries: HashMap<String, Entry<H>>,
}

impl<H: TerminalHandle> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: TerminalHandle> SessionRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `handle` under `name`.
    ///
    /// A handle already registered under the same name is disposed first
    /// (and its pending send cancelled) rather than leaked. Returns whether
    /// an entry was replaced.
    pub fn put(&mut self, name: &str, handle: H) -> bool {
        let previous = self.entries.insert(
            name.to_string(),
            Entry {
                handle,
                pending_send: None,
            },
        );
        match previous {
            Some(mut old) => {
                tracing::warn!(terminal = %name, "replacing a registered terminal; disposing the old one");
                old.cancel_pending();
                old.handle.dispose();
                true
            }
            None => false,
        }
    }

    /// Attach the cancellation token of a scheduled send to `name`'s entry.
    pub fn set_pending_send(&mut self, name: &str, token: CancellationToken) {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.cancel_pending();
                entry.pending_send = Some(token);
            }
            None => token.cancel(),
        }
    }

    /// Remove `name`, cancelling its pending send. The caller owns disposal.
    pub fn remove(&mut self, name: &str) -> Option<H> {
        self.entries.remove(name).map(|mut entry| {
            entry.cancel_pending();
            entry.handle
        })
    }

    /// Remove whichever entry holds the terminal with `id`.
    ///
    /// Lookup is by identity rather than name so a late notification from a
    /// replaced terminal cannot evict its successor.
    pub fn remove_by_id(&mut self, id: TerminalId) -> Option<(String, H)> {
        let name = self
            .entries
            .iter()
            .find(|(_, entry)| entry.handle.id() == id)
            .map(|(name, _)| name.clone())?;
        self.remove(&name).map(|handle| (name, handle))
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.entries.get(name).map(|entry| &entry.handle)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Cancel every pending send, dispose every handle, and empty the
    /// registry. Returns how many terminals were disposed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for (name, mut entry) in self.entries.drain() {
            entry.cancel_pending();
            entry.handle.dispose();
            tracing::debug!(terminal = %name, "terminal removed from registry");
        }
        count
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_running(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

/// A spec that `start` did not launch, and why.
#[derive(Debug)]
pub struct Skipped {
    pub name: String,
    pub reason: SessionError,
}

/// Outcome of one `start`: what was launched, what was held back, what failed.
#[derive(Debug, Default)]
pub struct StartReport {
    /// Launched terminals, in configuration order.
    pub started: Vec<String>,
    /// Specs with `autoStart: false`.
    pub manual: Vec<String>,
    pub skipped: Vec<Skipped>,
}

/// Snapshot for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub running: bool,
    pub terminals: usize,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.running {
            write!(f, "● ryo: running ({})", self.terminals)
        } else {
            write!(f, "○ ryo: stopped")
        }
    }
}

#[derive(Debug)]
pub enum Toggled {
    Started(StartReport),
    Stopped(usize),
}

/// Owns the registry, the host and the configuration last started.
///
/// One manager lives for the whole process. Dropping it disposes every
/// terminal it still holds.
pub struct SessionManager<H: TerminalHost> {
    host: H,
    registry: SessionRegistry<H::Handle>,
    current: Option<SetupConfig>,
    workspace_root: PathBuf,
    restart_pause: Duration,
}

impl<H: TerminalHost> SessionManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            registry: SessionRegistry::new(),
            current: None,
            workspace_root: PathBuf::new(),
            restart_pause: DEFAULT_RESTART_PAUSE,
        }
    }

    pub fn with_restart_pause(mut self, pause: Duration) -> Self {
        self.restart_pause = pause;
        self
    }

    pub fn registry(&self) -> &SessionRegistry<H::Handle> {
        &self.registry
    }

    pub fn current_config(&self) -> Option<&SetupConfig> {
        self.current.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.registry.is_running()
    }

    pub fn status(&self) -> Status {
        Status {
            running: self.registry.is_running(),
            terminals: self.registry.size(),
        }
    }

    /// Launch every auto-start spec of `config`, in order.
    ///
    /// A spec whose directory is missing, or whose terminal cannot be
    /// created, is reported and skipped; the rest still start. Terminals
    /// left from a previous start are disposed first. Outside a tokio
    /// runtime, specs with a delay are skipped with
    /// [`SessionError::NoRuntime`].
    pub fn start(&mut self, config: SetupConfig, workspace_root: &Path) -> StartReport {
        if self.registry.is_running() {
            let disposed = self.registry.clear();
            tracing::info!(disposed, "replacing running terminals");
        }

        let mut config = config;
        config.resolve_directories(workspace_root);
        tracing::info!(config = %config.name, terminals = config.terminals.len(), "starting");

        let mut report = StartReport::default();
        let mut first: Option<H::Handle> = None;
        let mut others: Vec<H::Handle> = Vec::new();

        for (index, spec) in config.terminals.iter().enumerate() {
            if !spec.auto_start() {
                tracing::debug!(terminal = %spec.name, "auto start disabled, skipping");
                report.manual.push(spec.name.clone());
                continue;
            }
            match self.launch(&config, index, workspace_root) {
                Ok(handle) => {
                    report.started.push(spec.name.clone());
                    if first.is_none() {
                        first = Some(handle);
                    } else {
                        others.push(handle);
                    }
                }
                Err(reason) => {
                    tracing::warn!(terminal = %spec.name, error = %reason, "skipping terminal");
                    report.skipped.push(Skipped {
                        name: spec.name.clone(),
                        reason,
                    });
                }
            }
        }

        if let Some(handle) = &first {
            handle.show(true);
        }
        for handle in &others {
            handle.show(false);
        }

        self.current = Some(config);
        self.workspace_root = workspace_root.to_path_buf();
        tracing::info!(
            started = report.started.len(),
            skipped = report.skipped.len(),
            running = self.registry.is_running(),
            "start finished"
        );
        report
    }

    /// Dispose every terminal. A no-op when nothing is running.
    pub fn stop_all(&mut self) -> usize {
        let disposed = self.registry.clear();
        if disposed > 0 {
            tracing::info!(disposed, "stopped all terminals");
        }
        disposed
    }

    /// Stop everything, wait for the restart pause, then start the current
    /// configuration again.
    pub async fn restart_all(&mut self) -> Result<StartReport, SessionError> {
        let config = self.current.clone().ok_or(SessionError::NoCurrentConfig)?;
        let workspace_root = self.workspace_root.clone();
        self.stop_all();
        tokio::time::sleep(self.restart_pause).await;
        Ok(self.start(config, &workspace_root))
    }

    /// Recreate the single terminal `name` from the current configuration.
    ///
    /// Unknown names leave the registry untouched. The terminal is launched even
    /// when it is not an auto-start one.
    pub fn restart_one(&mut self, name: &str) -> Result<(), SessionError> {
        let config = self.current.clone().ok_or(SessionError::NoCurrentConfig)?;
        let index = config
            .terminals
            .iter()
            .position(|spec| spec.name == name)
            .ok_or_else(|| SessionError::UnknownTerminal(name.to_string()))?;

        if let Some(old) = self.registry.remove(name) {
            old.dispose();
        }
        let workspace_root = self.workspace_root.clone();
        let handle = self.launch(&config, index, &workspace_root)?;
        handle.show(true);
        tracing::info!(terminal = %name, "terminal restarted");
        Ok(())
    }

    /// Stop when running, otherwise start `config`.
    pub fn toggle(&mut self, config: SetupConfig, workspace_root: &Path) -> Toggled {
        if self.registry.is_running() {
            Toggled::Stopped(self.stop_all())
        } else {
            Toggled::Started(self.start(config, workspace_root))
        }
    }

    /// Forget a terminal that ended on its own. Returns false for terminals
    /// no longer registered (already disposed or replaced).
    pub fn on_terminal_closed(&mut self, event: &TerminalClosed) -> bool {
        match self.registry.remove_by_id(event.id) {
            Some((name, _)) => {
                tracing::info!(terminal = %name, "terminal closed");
                if !self.registry.is_running() {
                    tracing::info!("all terminals closed");
                }
                true
            }
            None => {
                tracing::debug!(terminal = %event.name, "closed terminal was not registered");
                false
            }
        }
    }

    /// Dispose everything. Also runs on drop.
    pub fn shutdown(&mut self) {
        self.stop_all();
    }

    /// Create, register and feed the command for `config.terminals[index]`.
    fn launch(
        &mut self,
        config: &SetupConfig,
        index: usize,
        workspace_root: &Path,
    ) -> Result<H::Handle, SessionError> {
        let spec: &TerminalSpec = &config.terminals[index];
        let directory = resolve_directory(&spec.directory, workspace_root);
        if !directory.is_dir() {
            return Err(SessionError::MissingDirectory {
                name: spec.name.clone(),
                directory,
            });
        }

        // Checked before the terminal exists so a failure leaves nothing behind.
        let schedule = match spec.send_delay() {
            Some(delay) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => Some((delay, runtime)),
                Err(_) => {
                    return Err(SessionError::NoRuntime {
                        name: spec.name.clone(),
                    })
                }
            },
            None => None,
        };

        let options = TerminalOptions {
            name: spec.name.clone(),
            cwd: directory,
            icon: spec.icon.clone(),
            color: spec
                .color
                .clone()
                .or_else(|| Some(PALETTE[index % PALETTE.len()].to_string())),
            env: config.environment.clone(),
        };
        let handle = self
            .host
            .create(options)
            .map_err(|source| SessionError::Host {
                name: spec.name.clone(),
                source,
            })?;
        self.registry.put(&spec.name, handle.clone());

        match schedule {
            None => {
                if let Err(e) = handle.send_text(&spec.command) {
                    tracing::warn!(terminal = %spec.name, error = %e, "failed to send command");
                } else {
                    tracing::debug!(terminal = %spec.name, command = %spec.command, "command sent");
                }
            }
            Some((delay, runtime)) => {
                let token = CancellationToken::new();
                self.registry.set_pending_send(&spec.name, token.clone());
                let handle = handle.clone();
                let command = spec.command.clone();
                tracing::debug!(terminal = %spec.name, ?delay, "command scheduled");
                runtime.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            tracing::debug!(terminal = %handle.name(), "scheduled command cancelled");
                        }
                        _ = tokio::time::sleep(delay) => {
                            match handle.send_text(&command) {
                                Ok(()) => tracing::debug!(terminal = %handle.name(), "delayed command sent"),
                                Err(e) => tracing::warn!(terminal = %handle.name(), error = %e, "failed to send delayed command"),
                            }
                        }
                    }
                });
            }
        }

        Ok(handle)
    }
}

impl<H: TerminalHost> Drop for SessionManager<H> {
    fn drop(&mut self) {
        self.registry.clear();
    }
}
