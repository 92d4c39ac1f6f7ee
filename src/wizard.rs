//! Interactive builder for a `ryosetup.json`.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;
use thiserror::Error;

use crate::config::{SetupConfig, TerminalSpec};
use crate::terminal::PALETTE;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("input ended before the configuration was complete")]
    Aborted,

    #[error("wizard io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Prompts on `output`, reads answers line by line from `input`.
pub struct Wizard<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Wizard<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask for a configuration name and then terminals until a blank name.
    /// Directories in the result are resolved against `workspace_root`.
    pub fn run(&mut self, workspace_root: &Path) -> Result<SetupConfig, WizardError> {
        let default_name = workspace_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string());

        let name = self.ask_or_abort(&format!("Configuration name [{default_name}]: "))?;
        let name = if name.is_empty() { default_name } else { name };

        let mut terminals: Vec<TerminalSpec> = Vec::new();
        loop {
            let prompt = format!("Terminal #{} name (blank to finish): ", terminals.len() + 1);
            let Some(term_name) = self.ask(&prompt)? else {
                break;
            };
            if term_name.is_empty() {
                if terminals.is_empty() {
                    writeln!(self.output, "At least one terminal is required.")?;
                    continue;
                }
                break;
            }
            if terminals.iter().any(|t| t.name == term_name) {
                writeln!(self.output, "A terminal named {term_name} already exists.")?;
                continue;
            }

            let directory = self.ask_or_abort("  Directory [.]: ")?;
            let directory = if directory.is_empty() { ".".to_string() } else { directory };
            let command = self.ask_or_abort("  Command: ")?;
            let delay = self.ask_delay()?;
            let auto_start = self.ask_yes_no("  Start automatically? [Y/n]: ")?;

            let mut spec = TerminalSpec::new(term_name, directory, command)
                .with_color(PALETTE[terminals.len() % PALETTE.len()]);
            spec.delay = delay;
            spec.auto_start = (!auto_start).then_some(false);
            terminals.push(spec);
        }

        if terminals.is_empty() {
            return Err(WizardError::Aborted);
        }

        let mut config = SetupConfig {
            name,
            description: None,
            version: None,
            environment: BTreeMap::new(),
            terminals,
        };
        config.resolve_directories(workspace_root);
        Ok(config)
    }

    /// `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>, WizardError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_or_abort(&mut self, prompt: &str) -> Result<String, WizardError> {
        self.ask(prompt)?.ok_or(WizardError::Aborted)
    }

    fn ask_delay(&mut self) -> Result<Option<u64>, WizardError> {
        loop {
            let answer = self.ask_or_abort("  Delay before the command, in ms [0]: ")?;
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<u64>() {
                Ok(0) => return Ok(None),
                Ok(ms) => return Ok(Some(ms)),
                Err(_) => writeln!(self.output, "Enter a whole number of milliseconds.")?,
            }
        }
    }

    fn ask_yes_no(&mut self, prompt: &str) -> Result<bool, WizardError> {
        loop {
            let answer = self.ask_or_abort(prompt)?.to_ascii_lowercase();
            match answer.as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Answer y or n.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn run(script: &str) -> (Result<SetupConfig, WizardError>, String) {
        let mut out = Vec::new();
        let result = Wizard::new(Cursor::new(script.to_string()), &mut out).run(Path::new("/work/shop"));
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn builds_two_terminals() {
        let script = "Shop\nWeb\n./web\nnpm run dev\n\n\nApi\napi\nphp artisan serve\n500\nn\n\n";
        let (result, _) = run(script);
        let config = result.unwrap();
        assert_eq!(config.name, "Shop");
        assert_eq!(config.terminals.len(), 2);

        let web = &config.terminals[0];
        assert_eq!(web.directory, PathBuf::from("/work/shop/web"));
        assert_eq!(web.command, "npm run dev");
        assert!(web.delay.is_none());
        assert!(web.auto_start.is_none());

        let api = &config.terminals[1];
        assert_eq!(api.delay, Some(500));
        assert_eq!(api.auto_start, Some(false));
        assert_ne!(web.color, api.color);
        config.validate().unwrap();
    }

    #[test]
    fn defaults_name_and_directory() {
        let (result, _) = run("\nDev\n\nnpm run dev\n\ny\n\n");
        let config = result.unwrap();
        assert_eq!(config.name, "shop");
        assert_eq!(config.terminals[0].directory, PathBuf::from("/work/shop"));
    }

    #[test]
    fn rejects_duplicates_and_bad_delays() {
        let script = "X\nDev\n.\na\nsoon\n10\nmaybe\nyes\nDev\n\n";
        let (result, output) = run(script);
        let config = result.unwrap();
        assert_eq!(config.terminals.len(), 1);
        assert_eq!(config.terminals[0].delay, Some(10));
        assert!(output.contains("Enter a whole number"));
        assert!(output.contains("Answer y or n."));
        assert!(output.contains("already exists"));
    }

    #[test]
    fn requires_one_terminal() {
        let (result, output) = run("X\n\n");
        assert!(matches!(result, Err(WizardError::Aborted)));
        assert!(output.contains("At least one terminal is required."));
    }

    #[test]
    fn eof_mid_terminal_aborts() {
        let (result, _) = run("X\nDev\n./dev\n");
        assert!(matches!(result, Err(WizardError::Aborted)));
    }
}
