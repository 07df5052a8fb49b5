//! CLI argument parsing and validation module
//!
//! Handles the command-line interface using clap:
//! - `run`: start the guard engine with its interactive console
//! - `ps`: one-shot fuzzy search over running processes
//! - global `--config` path, help and version

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use locker::config::{parse_protect_pair, LockerConfiguration};
use locker::constants::{POLL_INTERVAL_MAX_MS, POLL_INTERVAL_MIN_MS};
use locker::logging::LogLevel;

/// Parsed command line
#[derive(Debug)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub command: CliCommand,
}

#[derive(Debug)]
pub enum CliCommand {
    Run(RunOptions),
    Ps(PsOptions),
}

/// Overrides applied on top of the configuration file
#[derive(Debug, Default)]
pub struct RunOptions {
    pub interval_ms: Option<u64>,
    pub protect: Vec<(String, String)>,
    pub release_on_exit: bool,
    pub verbose: bool,
}

impl RunOptions {
    pub fn apply(&self, config: &mut LockerConfiguration) {
        if let Some(interval) = self.interval_ms {
            config.guard.poll_interval_ms = interval;
        }
        if self.release_on_exit {
            config.guard.release_on_exit = true;
        }
        if self.verbose {
            config.logging.level = LogLevel::Debug;
        }
        for (name, password) in &self.protect {
            config.programs.insert(name.clone(), password.clone());
        }
    }
}

#[derive(Debug, Default)]
pub struct PsOptions {
    pub query: String,
    pub json: bool,
}

fn build_command() -> Command {
    Command::new("locker")
        .version(env!("LOCKER_VERSION"))
        .long_version(concat!(env!("LOCKER_VERSION"), " (", env!("GIT_HASH"), ")"))
        .about("Password-protect programs by suspending them at launch")
        .long_about(
            "Watches process creation and suspends every new instance of a protected program \
             until its password is entered on the console.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (default: <config dir>/locker/config.toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Start guarding protected programs")
                .arg(
                    Arg::new("interval-ms")
                        .short('i')
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Delay between two guard ticks in milliseconds (10-60000)")
                        .value_parser(
                            clap::value_parser!(u64).range(POLL_INTERVAL_MIN_MS..=POLL_INTERVAL_MAX_MS),
                        ),
                )
                .arg(
                    Arg::new("protect")
                        .short('p')
                        .long("protect")
                        .value_name("NAME=PASSWORD")
                        .help("Protect a program (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("release-on-exit")
                        .long("release-on-exit")
                        .help("Resume every suspended program when locker exits")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help("Log debug events")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("ps")
                .about("Fuzzy search running processes by name")
                .arg(
                    Arg::new("query")
                        .value_name("QUERY")
                        .help("Program name to look for; lists every process when omitted"),
                )
                .arg(
                    Arg::new("json")
                        .short('j')
                        .long("json")
                        .help("Output in JSON format")
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// Parse command line arguments of the current process
pub fn parse_args() -> Result<CliArgs> {
    let matches = build_command().get_matches();
    from_matches(&matches)
}

#[cfg(test)]
fn parse_from<I, T>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    from_matches(&matches)
}

fn from_matches(matches: &ArgMatches) -> Result<CliArgs> {
    let config = matches.get_one::<PathBuf>("config").cloned();

    let command = match matches.subcommand() {
        Some(("run", sub)) => {
            let protect = sub
                .get_many::<String>("protect")
                .map(|values| values.map(|raw| parse_protect_pair(raw)).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();

            CliCommand::Run(RunOptions {
                interval_ms: sub.get_one::<u64>("interval-ms").copied(),
                protect,
                release_on_exit: sub.get_flag("release-on-exit"),
                verbose: sub.get_flag("verbose"),
            })
        }
        Some(("ps", sub)) => CliCommand::Ps(PsOptions {
            query: sub.get_one::<String>("query").cloned().unwrap_or_default(),
            json: sub.get_flag("json"),
        }),
        _ => anyhow::bail!("A subcommand is required; see --help"),
    };

    Ok(CliArgs { config, command })
}
