use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tb_cli::commands::{bins, budget, check, exhaustivity, fix};
use tb_cli::{Cli, Commands, Config, Session};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    let config = load_config(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Check { session } => {
            let session = Session::read(session)?;
            if !check::run(&mut stdout, &session, config.time_format)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Exhaustivity { session, json } => {
            let session = Session::read(session)?;
            exhaustivity::run(&mut stdout, &session, *json)?;
        }
        Commands::Fix { session, at, output } => {
            let session = Session::read(session)?;
            let (added, json) = fix::run(session, *at, config.epsilon_ms)?;
            match output {
                Some(path) => {
                    std::fs::write(path, format!("{json}\n"))
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    writeln!(stdout, "Added {added} closing events to {}", path.display())?;
                }
                None => writeln!(stdout, "{json}")?,
            }
        }
        Commands::Budget {
            session,
            grouping,
            window,
            selection,
            exclude_empty,
            json,
        } => {
            let session = Session::read(session)?;
            let params = selection.budget_parameters(*grouping, *exclude_empty);
            budget::run(&mut stdout, &session, &config, &window.request(), &params, *json)?;
        }
        Commands::Bins {
            session,
            bin_size,
            window,
            selection,
            json,
        } => {
            let session = Session::read(session)?;
            let params = selection.bin_parameters(*bin_size);
            bins::run(
                &mut stdout,
                &session,
                &window.request(),
                &params,
                config.time_format,
                *json,
            )?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
