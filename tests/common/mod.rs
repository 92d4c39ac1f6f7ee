#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ryo::config::{SetupConfig, TerminalSpec};
use ryo::terminal::{HostError, TerminalHandle, TerminalHost, TerminalId, TerminalOptions};

/// Everything a [`FakeHost`] or its handles were asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { name: String, cwd: PathBuf, color: Option<String> },
    Send { name: String, text: String },
    Show { name: String, focus: bool },
    Dispose { name: String },
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn sent_to(&self, name: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Send { name: n, text } if n == name => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Create { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn disposed(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Dispose { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn focused(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Show { name, focus: true } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// In-memory terminal host that records calls instead of spawning shells.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub recorder: Recorder,
    next_id: TerminalId,
    /// Names whose creation fails.
    pub failing: HashSet<String>,
}

impl FakeHost {
    pub fn new() -> (Self, Recorder) {
        let host = Self::default();
        let recorder = host.recorder.clone();
        (host, recorder)
    }
}

impl TerminalHost for FakeHost {
    type Handle = FakeHandle;

    fn create(&mut self, options: TerminalOptions) -> Result<FakeHandle, HostError> {
        if self.failing.contains(&options.name) {
            return Err(HostError::Other(anyhow::anyhow!("refusing to create {}", options.name)));
        }
        self.next_id += 1;
        self.recorder.push(Call::Create {
            name: options.name.clone(),
            cwd: options.cwd.clone(),
            color: options.color.clone(),
        });
        Ok(FakeHandle {
            id: self.next_id,
            name: options.name,
            recorder: self.recorder.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeHandle {
    pub id: TerminalId,
    pub name: String,
    recorder: Recorder,
}

impl TerminalHandle for FakeHandle {
    fn id(&self) -> TerminalId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn send_text(&self, text: &str) -> Result<(), HostError> {
        self.recorder.push(Call::Send {
            name: self.name.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn show(&self, focus: bool) {
        self.recorder.push(Call::Show {
            name: self.name.clone(),
            focus,
        });
    }

    fn dispose(&self) {
        self.recorder.push(Call::Dispose {
            name: self.name.clone(),
        });
    }
}

/// A workspace with one subdirectory per name.
pub fn workspace_with_dirs(dirs: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in dirs {
        std::fs::create_dir_all(dir.path().join(name)).expect("create dir");
    }
    dir
}

/// A configuration with one terminal per `(name, directory, command)`.
pub fn config_of(specs: &[(&str, &str, &str)]) -> SetupConfig {
    SetupConfig {
        name: "Test".into(),
        description: None,
        version: None,
        environment: Default::default(),
        terminals: specs
            .iter()
            .map(|(name, dir, cmd)| TerminalSpec::new(*name, *dir, *cmd))
            .collect(),
    }
}

pub fn path_of(root: &Path, dir: &str) -> PathBuf {
    ryo::config::resolve_directory(Path::new(dir), root)
}
