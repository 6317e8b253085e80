//! # Operator Console
//!
//! Line-based stand-in for the dashboard's controls.
//!
//! | Line            | Command                      |
//! |-----------------|------------------------------|
//! | `pause`         | `SetRunning(false)`          |
//! | `start`         | `SetRunning(true)`           |
//! | `toggle`        | `ToggleRunning`              |
//! | `reset`         | `ResetIndex`                 |
//! | `interval <ms>` | `SetInterval(ms)`            |
//! | `live on\|off`  | `SetLiveMode(true\|false)`   |
//! | `quit`, `exit`  | `Shutdown`                   |

use std::io::BufRead;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::warn;

use crate::dashboard::Command;
use crate::error::TelloTwinError;

impl FromStr for Command {
    type Err = TelloTwinError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();

        if words.next().is_some() {
            return Err(TelloTwinError::Command(format!("too many arguments: {}", line.trim())));
        }

        let command = match (verb.as_str(), arg) {
            ("pause", None) => Command::SetRunning(false),
            ("start" | "resume", None) => Command::SetRunning(true),
            ("toggle", None) => Command::ToggleRunning,
            ("reset", None) => Command::ResetIndex,
            ("interval", Some(ms)) => Command::SetInterval(ms.parse().map_err(|_| {
                TelloTwinError::Command(format!("interval expects milliseconds, got '{}'", ms))
            })?),
            ("live", Some(mode)) => match mode.to_ascii_lowercase().as_str() {
                "on" => Command::SetLiveMode(true),
                "off" => Command::SetLiveMode(false),
                _ => {
                    return Err(TelloTwinError::Command(format!(
                        "live expects 'on' or 'off', got '{}'",
                        mode
                    )))
                }
            },
            ("quit" | "exit", None) => Command::Shutdown,
            _ => return Err(TelloTwinError::Command(line.trim().to_string())),
        };

        Ok(command)
    }
}

/// Forward parsed lines from `reader` until EOF, `quit`, or a closed channel
///
/// Blocking; run it on a dedicated thread. Blank lines are skipped and
/// unparsable ones logged.
pub fn forward_lines<R: BufRead>(reader: R, commands: &mpsc::Sender<Command>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                if commands.blocking_send(command).is_err() || command == Command::Shutdown {
                    break;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
}

/// Read operator commands from stdin on a background thread
pub fn spawn_stdin_reader(commands: mpsc::Sender<Command>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), &commands))
}
