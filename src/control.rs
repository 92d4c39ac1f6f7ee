//! Commands accepted on stdin while terminals are running.

use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Status,
    List,
    Start,
    Stop,
    Toggle,
    /// `None` restarts everything.
    Restart(Option<String>),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  status            show whether terminals are running
  list              list running terminals
  start             start the configuration again
  stop              stop every terminal
  toggle            stop when running, start otherwise
  restart [name]    restart everything, or one terminal by name
  quit              stop everything and exit";

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "status" | "s" => Self::Status,
            "list" | "ls" => Self::List,
            "start" | "up" => Self::Start,
            "stop" | "down" => Self::Stop,
            "toggle" | "t" => Self::Toggle,
            // Terminal names may contain spaces ("Dev Terminal").
            "restart" | "r" => Self::Restart((!rest.is_empty()).then(|| rest.to_string())),
            "help" | "h" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            "" => return Err("empty command".to_string()),
            other => return Err(format!("unknown command: {other} (try `help`)")),
        };
        if !rest.is_empty() && !matches!(command, Self::Restart(_)) {
            return Err(format!("{verb} takes no arguments"));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_commands() {
        assert_eq!("status".parse(), Ok(ControlCommand::Status));
        assert_eq!(" STOP ".parse(), Ok(ControlCommand::Stop));
        assert_eq!("q".parse(), Ok(ControlCommand::Quit));
        assert_eq!("toggle".parse(), Ok(ControlCommand::Toggle));
    }

    #[test]
    fn restart_with_and_without_name() {
        assert_eq!("restart".parse(), Ok(ControlCommand::Restart(None)));
        assert_eq!(
            "restart Dev Terminal".parse(),
            Ok(ControlCommand::Restart(Some("Dev Terminal".to_string())))
        );
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!("launch".parse::<ControlCommand>().is_err());
        assert!("".parse::<ControlCommand>().is_err());
        assert!("stop now".parse::<ControlCommand>().is_err());
    }
}
