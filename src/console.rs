//! Interactive console of `locker run`
//!
//! Reads commands from stdin while the guard drivers run in the background,
//! and announces programs as soon as they are locked.

use anyhow::Result;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use locker::guard::{GuardEngine, StopSignal};
use locker::models::{GuardError, ProcessName};

use crate::output;

const HELP: &str = "\
Commands:
  protect <name> <password>   Protect a program (quote names with spaces)
  unprotect <name>            Stop protecting a program (must not be locked)
  unlock <password>           Unlock every locked program using this password
  ps [query]                  Fuzzy search running processes
  protected                   List protected programs
  status [--json]             Show the guard collections
  help                        Show this help
  quit                        Stop locker
While a program is locked, any other line is taken as a password.
";

/// Why the console returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    EndOfInput,
    Signal,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Quit => "quit command",
            ExitReason::EndOfInput => "end of input",
            ExitReason::Signal => "received shutdown signal",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Quit,
}

fn text(message: impl Into<String>) -> Reply {
    Reply::Output(message.into())
}

fn error_reply(error: GuardError) -> Reply {
    text(format!("❌ {}\n", error))
}

/// Split `protect` arguments into name and password. The password is the last
/// word; a name may also be quoted, in which case the password may contain spaces.
fn split_protect_args(rest: &str) -> Option<(&str, &str)> {
    if let Some(quoted) = rest.strip_prefix('"') {
        let (name, password) = quoted.split_once('"')?;
        let password = password.trim();
        return (!password.is_empty()).then_some((name, password));
    }
    rest.rsplit_once(char::is_whitespace)
        .map(|(name, password)| (name.trim_end(), password))
}

/// Execute one console line against the engine
pub async fn execute(engine: &GuardEngine, line: &str) -> Result<Reply> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(text(""));
    }
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim()))
        .unwrap_or((line, ""));

    let reply = match command {
        "protect" => match split_protect_args(rest) {
            Some((name, password)) => match engine.request_protect(name, password).await {
                Ok(name) => text(format!("🛡️  Protecting {}\n", name)),
                Err(e) => error_reply(e),
            },
            None => text("Usage: protect <name> <password>\n"),
        },
        "unprotect" if !rest.is_empty() => match engine.unprotect(rest.trim_matches('"')).await {
            Ok(()) => text(format!("No longer protecting {}\n", ProcessName::new(rest.trim_matches('"')))),
            Err(e) => error_reply(e),
        },
        "unprotect" => text("Usage: unprotect <name>\n"),
        "unlock" if !rest.is_empty() => text(output::format_unlocked(&engine.submit_password(rest).await)),
        "unlock" => text("Usage: unlock <password>\n"),
        "ps" => text(output::format_matches(&engine.search(rest).await)),
        "protected" => text(output::format_protected(&engine.protected_programs().await)),
        "status" if rest == "--json" => text(output::to_json(&engine.status().await)? + "\n"),
        "status" => text(output::format_status(&engine.status().await)),
        "help" => text(HELP),
        "quit" | "exit" => Reply::Quit,
        _ if engine.has_suspended().await => {
            text(output::format_unlocked(&engine.submit_password(line).await))
        }
        _ => text(format!("Unknown command '{}'. Type `help` for a list of commands.\n", command)),
    };
    Ok(reply)
}

/// Suspended names not announced yet; forgets names that are no longer locked
async fn newly_locked(engine: &GuardEngine, announced: &mut BTreeSet<ProcessName>) -> Vec<ProcessName> {
    let locked: BTreeSet<ProcessName> = engine
        .suspended()
        .await
        .into_iter()
        .map(|instance| instance.name)
        .collect();

    announced.retain(|name| locked.contains(name));
    let fresh: Vec<ProcessName> = locked.difference(announced).cloned().collect();
    announced.extend(fresh.iter().cloned());
    fresh
}

/// Run the console until `quit`, end of input, or the stop signal
pub async fn run(engine: &GuardEngine, stop: &StopSignal, tick: Duration) -> Result<ExitReason> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut ticker = tokio::time::interval(tick);
    let mut announced = BTreeSet::new();

    stdout
        .write_all(b"locker is running. Type `help` for a list of commands.\n")
        .await?;
    stdout.flush().await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(ExitReason::EndOfInput);
                };
                match execute(engine, &line).await? {
                    Reply::Output(message) => stdout.write_all(message.as_bytes()).await?,
                    Reply::Quit => return Ok(ExitReason::Quit),
                }
                stdout.flush().await?;
            }
            _ = ticker.tick() => {
                if stop.is_stopped() {
                    return Ok(ExitReason::Signal);
                }
                let fresh = newly_locked(engine, &mut announced).await;
                if !fresh.is_empty() {
                    stdout.write_all(output::format_locked_notice(&fresh).as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
        }
    }
}
