//! ryo - launch a project's dev and serve terminals.
//!
//! A workspace describes its terminals in `ryosetup.json` (or the older
//! line-based `ryosetup` file). When there is no file, the project type is
//! guessed from the workspace root and a matching preset is used instead.

pub mod config;
pub mod control;
pub mod detect;
pub mod presets;
pub mod pty;
pub mod resolve;
pub mod session;
pub mod settings;
pub mod terminal;
pub mod wizard;
