use crossterm::style::Stylize;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::settings::Settings;
use crate::terminal::{
    parse_color, HostError, TerminalClosed, TerminalHandle, TerminalHost, TerminalId,
    TerminalOptions,
};

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    OpenPty(#[source] anyhow::Error),

    #[error("failed to spawn command: {0}")]
    SpawnCommand(#[source] anyhow::Error),

    #[error("failed to clone reader: {0}")]
    CloneReader(#[source] anyhow::Error),

    #[error("failed to take writer: {0}")]
    TakeWriter(#[source] anyhow::Error),

    #[error("failed to write to pty: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to start io thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// A shell running inside a pseudo-terminal.
pub struct Pty {
    master: Box<dyn MasterPty + Send>,
    child: Option<Box<dyn Child + Send + Sync>>,
}

impl Pty {
    /// Spawn `shell` in a fresh pty rooted at `options.cwd`.
    ///
    /// The slave side is dropped once the child holds it, so readers see
    /// EOF when the child goes away.
    pub fn spawn(
        shell: &str,
        options: &TerminalOptions,
        rows: u16,
        cols: u16,
    ) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system.openpty(size).map_err(PtyError::OpenPty)?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(&options.cwd);
        cmd.env("TERM", std::env::var("TERM").unwrap_or_else(|_| "xterm-256color".to_string()));
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(PtyError::SpawnCommand)?;
        drop(pair.slave);

        Ok(Self {
            master: pair.master,
            child: Some(child),
        })
    }

    pub fn take_reader(&self) -> Result<Box<dyn Read + Send>, PtyError> {
        self.master.try_clone_reader().map_err(PtyError::CloneReader)
    }

    pub fn take_writer(&self) -> Result<Box<dyn Write + Send>, PtyError> {
        self.master.take_writer().map_err(PtyError::TakeWriter)
    }

    /// Take ownership of the child for exit monitoring. `None` after the
    /// first call.
    pub fn take_child(&mut self) -> Option<Box<dyn Child + Send + Sync>> {
        self.child.take()
    }
}

/// Spawns each terminal as the user's shell in a pty and interleaves their
/// output on stdout with one colored `name |` prefix per line.
pub struct PtyHost {
    shell: String,
    rows: u16,
    cols: u16,
    next_id: TerminalId,
    closed_tx: mpsc::UnboundedSender<TerminalClosed>,
}

impl PtyHost {
    /// Returns the host and the receiving end of its closed notifications.
    pub fn new(settings: &Settings) -> (Self, mpsc::UnboundedReceiver<TerminalClosed>) {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let host = Self {
            shell: settings.shell(),
            rows: settings.rows,
            cols: settings.cols,
            next_id: 0,
            closed_tx,
        };
        (host, closed_rx)
    }
}

impl TerminalHost for PtyHost {
    type Handle = PtyHandle;

    fn create(&mut self, options: TerminalOptions) -> Result<PtyHandle, HostError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut pty = Pty::spawn(&self.shell, &options, self.rows, self.cols)?;
        let child = pty
            .take_child()
            .ok_or_else(|| anyhow::anyhow!("pty for {} has no child", options.name))?;
        let mut killer = child.clone_killer();
        let pid = child.process_id();

        // The shell is already running; any wiring failure must take it down.
        let writer = kill_on_error(
            self.start_io(&pty, child, id, &options),
            killer.as_mut(),
            &options.name,
        )?;

        tracing::info!(terminal = %options.name, cwd = %options.cwd.display(), ?pid, "terminal created");

        Ok(PtyHandle {
            inner: Arc::new(PtyHandleInner {
                id,
                name: options.name,
                pid,
                writer: Mutex::new(writer),
                killer: Mutex::new(killer),
                _pty: Mutex::new(pty),
                disposed: AtomicBool::new(false),
            }),
        })
    }
}

impl PtyHost {
    /// Start the output forwarder and the exit monitor; returns the writer.
    fn start_io(
        &self,
        pty: &Pty,
        mut child: Box<dyn Child + Send + Sync>,
        id: TerminalId,
        options: &TerminalOptions,
    ) -> Result<Box<dyn Write + Send>, PtyError> {
        let reader = pty.take_reader()?;
        let writer = pty.take_writer()?;

        let prefix = match options.color.as_deref().and_then(parse_color) {
            Some(color) => format!("{} | ", options.name.as_str().with(color).bold()),
            None => format!("{} | ", options.name),
        };

        std::thread::Builder::new()
            .name(format!("ryo-out-{id}"))
            .spawn(move || forward_output(reader, &prefix, &mut std::io::stdout()))
            .map_err(PtyError::Thread)?;

        // Child exit monitor. Sends the closed notification whether the
        // child ended on its own or because we killed it; the session layer
        // ignores ids it no longer tracks.
        let closed_tx = self.closed_tx.clone();
        let name = options.name.clone();
        std::thread::Builder::new()
            .name(format!("ryo-wait-{id}"))
            .spawn(move || {
                match child.wait() {
                    Ok(status) => tracing::debug!(terminal = %name, ?status, "terminal child exited"),
                    Err(e) => tracing::error!(terminal = %name, ?e, "error waiting for terminal child"),
                }
                let _ = closed_tx.send(TerminalClosed { id, name });
            })
            .map_err(PtyError::Thread)?;

        Ok(writer)
    }
}

/// Pass `result` through, killing the child first when it is an error.
fn kill_on_error<T>(
    result: Result<T, PtyError>,
    killer: &mut (dyn ChildKiller + Send + Sync),
    name: &str,
) -> Result<T, PtyError> {
    if let Err(e) = &result {
        tracing::warn!(terminal = %name, error = %e, "terminal setup failed, killing shell");
        if let Err(kill_err) = killer.kill() {
            tracing::debug!(terminal = %name, ?kill_err, "kill after failed setup failed");
        }
    }
    result
}

/// Copy pty output to `out`, prefixing every complete line.
///
/// Write errors (a closed stdout) are ignored so the pty keeps draining.
fn forward_output<W: Write>(mut reader: Box<dyn Read + Send>, prefix: &str, out: &mut W) {
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    write_line(out, prefix, &line);
                }
            }
            // EIO once the slave side is gone.
            Err(_) => break,
        }
    }
    if !pending.is_empty() {
        write_line(out, prefix, &pending);
    }
}

/// One `write_all` per line so concurrent terminals never split a line.
fn write_line<W: Write>(out: &mut W, prefix: &str, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let line = format!("{prefix}{}\n", text.trim_end_matches(['\r', '\n']));
    let _ = out.write_all(line.as_bytes());
    let _ = out.flush();
}

struct PtyHandleInner {
    id: TerminalId,
    name: String,
    pid: Option<u32>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    /// Keeps the master side open for as long as the handle lives.
    _pty: Mutex<Pty>,
    disposed: AtomicBool,
}

#[derive(Clone)]
pub struct PtyHandle {
    inner: Arc<PtyHandleInner>,
}

impl std::fmt::Debug for PtyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("pid", &self.inner.pid)
            .finish_non_exhaustive()
    }
}

impl PtyHandle {
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Send SIGHUP to the child's process group.
    ///
    /// portable_pty calls setsid() when spawning, so the shell leads its own
    /// group and the signal also reaches the jobs it started.
    #[cfg(unix)]
    fn hangup_group(&self) {
        if let Some(pid) = self.inner.pid {
            if pid == 0 || pid > i32::MAX as u32 {
                tracing::warn!(pid, "PID is 0 or exceeds i32::MAX, cannot send signal");
                return;
            }
            unsafe {
                libc::kill(-(pid as i32), libc::SIGHUP);
            }
        }
    }

    #[cfg(not(unix))]
    fn hangup_group(&self) {}
}

impl TerminalHandle for PtyHandle {
    fn id(&self) -> TerminalId {
        self.inner.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn send_text(&self, text: &str) -> Result<(), HostError> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(HostError::Disposed(self.inner.name.clone()));
        }
        let mut writer = self.inner.writer.lock();
        writer
            .write_all(format!("{text}\n").as_bytes())
            .and_then(|_| writer.flush())
            .map_err(PtyError::Write)?;
        Ok(())
    }

    fn show(&self, focus: bool) {
        if focus {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{}", format!("==> {}", self.inner.name).bold());
        }
        tracing::debug!(terminal = %self.inner.name, focus, "terminal shown");
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hangup_group();
        if let Err(e) = self.inner.killer.lock().kill() {
            tracing::debug!(terminal = %self.inner.name, ?e, "kill after hangup failed");
        }
        tracing::info!(terminal = %self.inner.name, "terminal disposed");
    }
}
