mod cli;
mod commands;
mod config;
mod signal;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = if cli.debug { cli.verbose.max(2) } else { cli.verbose };

    // Initialize logging based on verbosity
    let log_level = match verbose {
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
        verbose,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Command::Sync(args) => commands::sync::run(&ctx, args),
        Command::SetupTeam(args) => commands::setup_team::run(&ctx, args),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "orgsync", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(err) = &result
        && err
            .downcast_ref::<reconcile::Error>()
            .is_some_and(|e| matches!(e, reconcile::Error::Cancelled))
    {
        ui::error("Interrupted - changes applied so far are kept");
        std::process::exit(signal::INTERRUPTED_EXIT);
    }
    result
}
