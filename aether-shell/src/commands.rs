//! Parsing of shell input lines into commands.

use aether::prelude::{EventKind, DEFAULT_WEIGHT};

pub const DEFAULT_HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    State,
    Watch(bool),
    Record {
        kind: EventKind,
        label: String,
        weight: f64,
    },
    History(usize),
    Count,
    Stride,
    Phases,
    Start,
    Stop,
    Help,
    Exit,
    Empty,
}

/// Parses one line of input. Errors carry the message shown to the user.
pub fn parse(line: &str) -> Result<Command, String> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Empty);
    };

    match *command {
        "state" => Ok(Command::State),
        "watch" => match rest {
            ["on"] => Ok(Command::Watch(true)),
            ["off"] => Ok(Command::Watch(false)),
            _ => Err("Usage: watch on|off".to_string()),
        },
        "record" => parse_record(rest),
        "history" => match rest {
            [] => Ok(Command::History(DEFAULT_HISTORY_LEN)),
            [n] => n
                .parse::<usize>()
                .map(Command::History)
                .map_err(|_| format!("Error: '{}' is not a valid count.", n)),
            _ => Err("Usage: history [N]".to_string()),
        },
        "count" => Ok(Command::Count),
        "stride" => Ok(Command::Stride),
        "phases" => Ok(Command::Phases),
        "start" => Ok(Command::Start),
        "stop" => Ok(Command::Stop),
        "help" => Ok(Command::Help),
        "exit" | "quit" => Ok(Command::Exit),
        _ => Err(format!("Unknown command: '{}'. Type 'help'.", line.trim())),
    }
}

fn parse_record(rest: &[&str]) -> Result<Command, String> {
    const USAGE: &str = "Usage: record <KEY|OTHER> <LABEL> [WEIGHT]";
    let (kind, label, weight) = match rest {
        [kind, label] => (kind, label, None),
        [kind, label, weight] => (kind, label, Some(weight)),
        _ => return Err(USAGE.to_string()),
    };
    let kind = kind.parse::<EventKind>().map_err(|e| format!("Error: {}", e))?;
    let weight = match weight {
        Some(w) => w
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite() && *w >= 0.0)
            .ok_or_else(|| format!("Error: '{}' is not a valid weight.", w))?,
        None => DEFAULT_WEIGHT,
    };
    Ok(Command::Record {
        kind,
        label: label.to_string(),
        weight,
    })
}

pub const HELP: &str = "\
Available commands:
  state                          - Shows the current phase and progress.
  watch on|off                   - Prints every phase transition.
  record <KEY|OTHER> <L> [W]     - Records a ledger event with label L and weight W (default 1).
  history [N]                    - Shows the N most recent ledger events (default 10).
  count                          - Total events ever recorded.
  stride                         - Byte stride of the retained events.
  phases                         - Lists the configured phases.
  stop / start                   - Pauses or resumes the tick loop.
  exit                           - Quits the shell.";
