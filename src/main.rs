#![forbid(unsafe_code)]

mod cli;
mod console;
mod output;

use anyhow::{Context, Result};
use std::path::PathBuf;

use locker::config::LockerConfiguration;
use locker::guard::GuardEngine;
use locker::logging::{init_logger, GuardLogger};
use locker::models::GuardError;
use locker::platform::{self, ProcessSource, SnapshotEventSource, SysinfoProcessSource};
use locker::search;

use cli::{CliCommand, PsOptions, RunOptions};

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    match args.command {
        CliCommand::Ps(options) => run_ps(args.config, &options),
        CliCommand::Run(options) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start the async runtime")?;
            let result = runtime.block_on(run_guard(args.config, options));
            // The stdin reader thread may still be parked in a blocking read
            runtime.shutdown_background();
            result
        }
    }
}

fn run_ps(config_path: Option<PathBuf>, options: &PsOptions) -> Result<()> {
    let (config, _) = LockerConfiguration::load(config_path.as_deref())?;
    init_logger(config.logging.level)?;

    let snapshot = SysinfoProcessSource::new()
        .list_running_processes()
        .context("Failed to enumerate running processes")?;
    let matches = search::search_matches(&options.query, &snapshot);

    if options.json {
        println!("{}", output::to_json(&matches)?);
    } else {
        print!("{}", output::format_matches(&matches));
    }
    Ok(())
}

async fn run_guard(config_path: Option<PathBuf>, options: RunOptions) -> Result<()> {
    let (mut config, loaded_from) = LockerConfiguration::load(config_path.as_deref())?;
    options.apply(&mut config);
    config.validate()?;

    init_logger(config.logging.level)?;
    let logger = GuardLogger::new(config.logging.level);
    let settings = config.guard_settings();

    let controller = platform::platform_controller()?;
    let events = SnapshotEventSource::subscribe(settings.poll_interval)
        .map_err(|e| GuardError::Subscription(e.to_string()))?;

    let engine = GuardEngine::new(logger.clone());
    for (name, password) in &config.programs {
        engine
            .request_protect(name, password)
            .await
            .with_context(|| format!("Invalid protected program entry '{}'", name))?;
    }
    logger.log_startup(loaded_from.as_deref(), config.programs.len());

    let tasks = engine.start(&settings, events, SysinfoProcessSource::new(), controller);
    let stop = tasks.stop_signal();
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop.flag())
        .context("Failed to register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.flag())
        .context("Failed to register SIGTERM handler")?;

    let reason = console::run(&engine, &stop, settings.poll_interval).await?;
    tasks.shutdown().await?;
    logger.log_shutdown(reason.as_str());
    Ok(())
}
