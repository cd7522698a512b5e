mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Config file passed with `--config`
    pub config: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            if let Some(drift_error) = e.downcast_ref::<driftkit::Error>() {
                ui::dim(drift_error.category().advice());
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };
    log::trace!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Scan(args) => {
            let fail_on_drift = args.fail_on_drift;
            let drifted = commands::scan::run(&ctx, args)?;
            if fail_on_drift && drifted {
                return Ok(ExitCode::from(1));
            }
        }
        Command::Index(args) => commands::index::run(&ctx, args)?,
        Command::Split(args) => commands::split::run(&ctx, args)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "driftscan", &mut io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}
