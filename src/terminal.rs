//! The terminal-spawning capability the session layer is written against.
//!
//! A host creates named terminals in a working directory and hands back a
//! cloneable handle. Hosts report terminals that end on their own through a
//! channel of [`TerminalClosed`] events, which the owner of the
//! [`SessionManager`](crate::session::SessionManager) feeds back into it.

use crossterm::style::Color;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::pty::PtyError;

/// Stable identity of one created terminal. Never reused within a host.
pub type TerminalId = u64;

/// Colors handed out, in configuration order, to specs without a color.
pub const PALETTE: [&str; 6] = ["cyan", "green", "yellow", "magenta", "blue", "red"];

#[derive(Error, Debug)]
pub enum HostError {
    #[error("pty error: {0}")]
    Pty(#[from] PtyError),

    #[error("terminal {0} is already disposed")]
    Disposed(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Everything a host needs to open one terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOptions {
    pub name: String,
    pub cwd: PathBuf,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub env: BTreeMap<String, String>,
}

/// Emitted by a host when a terminal ends without being disposed by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalClosed {
    pub id: TerminalId,
    pub name: String,
}

pub trait TerminalHandle: Clone + Send + Sync + 'static {
    fn id(&self) -> TerminalId;

    fn name(&self) -> &str;

    /// Type `text` into the terminal followed by a newline.
    fn send_text(&self, text: &str) -> Result<(), HostError>;

    /// Bring the terminal forward; `focus` also moves input focus to it.
    fn show(&self, focus: bool);

    /// Tear the terminal down. Calling it twice is harmless.
    fn dispose(&self);
}

pub trait TerminalHost {
    type Handle: TerminalHandle;

    fn create(&mut self, options: TerminalOptions) -> Result<Self::Handle, HostError>;
}

/// Map a display hint to a terminal color.
///
/// Accepts plain names (`"green"`) and editor theme keys
/// (`"terminal.ansiGreen"`, `"terminal.ansiBrightGreen"`).
pub fn parse_color(hint: &str) -> Option<Color> {
    let lower = hint.trim().to_ascii_lowercase();
    let name = lower.strip_prefix("terminal.ansi").unwrap_or(&lower);
    let (bright, base) = match name.strip_prefix("bright") {
        Some(rest) => (true, rest.trim_start_matches(['-', '_'])),
        None => (false, name),
    };
    let color = match (base, bright) {
        ("black", false) => Color::Black,
        ("black", true) => Color::DarkGrey,
        ("red", false) => Color::DarkRed,
        ("red", true) => Color::Red,
        ("green", false) => Color::DarkGreen,
        ("green", true) => Color::Green,
        ("yellow", false) => Color::DarkYellow,
        ("yellow", true) => Color::Yellow,
        ("blue", false) => Color::DarkBlue,
        ("blue", true) => Color::Blue,
        ("magenta", false) => Color::DarkMagenta,
        ("magenta", true) => Color::Magenta,
        ("cyan", false) => Color::DarkCyan,
        ("cyan", true) => Color::Cyan,
        ("white", false) => Color::Grey,
        ("white", true) => Color::White,
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_color_names() {
        assert_eq!(parse_color("green"), Some(Color::DarkGreen));
        assert_eq!(parse_color(" Cyan "), Some(Color::DarkCyan));
    }

    #[test]
    fn editor_theme_keys() {
        assert_eq!(parse_color("terminal.ansiYellow"), Some(Color::DarkYellow));
        assert_eq!(parse_color("terminal.ansiBrightBlue"), Some(Color::Blue));
        assert_eq!(parse_color("bright-red"), Some(Color::Red));
    }

    #[test]
    fn unknown_color_is_none() {
        assert_eq!(parse_color("chartreuse"), None);
        assert_eq!(parse_color(""), None);
    }

    #[test]
    fn palette_entries_all_parse() {
        for hint in PALETTE {
            assert!(parse_color(hint).is_some(), "{hint}");
        }
    }
}
