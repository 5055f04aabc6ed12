mod cli;
mod commands;
mod config;
mod paths;
mod resources;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub endpoint: Option<String>,
    pub config: Option<PathBuf>,
    pub resources: PathBuf,
    pub state: Option<PathBuf>,
}

fn main() -> Result<()> {
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
        endpoint: cli.endpoint,
        config: cli.config.map(|p| paths::expand(&p.to_string_lossy())),
        resources: paths::expand(&cli.resources.to_string_lossy()),
        state: cli.state.map(|p| paths::expand(&p.to_string_lossy())),
    };

    match cli.command {
        Command::Plan(args) => commands::plan::plan(&ctx, &args),
        Command::Apply(args) => commands::plan::apply(&ctx, &args),
        Command::Destroy(args) => commands::plan::destroy(&ctx, &args),
        Command::Import(args) => commands::import::run(&ctx, &args),
        Command::Refresh(args) => commands::state::refresh(&ctx, &args),
        Command::Show(args) => commands::state::show(&ctx, &args),
        Command::Validate => commands::plan::validate_config(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "idpctl", &mut io::stdout());
            Ok(())
        }
    }
}
