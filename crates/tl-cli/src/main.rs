use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tl_cli::commands::{convert, preprocess, validate};
use tl_cli::{Cli, Commands, Config};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = std::io::stdout().lock();
    let passed = match command {
        Commands::Preprocess {
            path,
            validate_source,
            convert,
            validate_output,
            enable_day_check,
            output_dir,
        } => {
            let options = preprocess::Options {
                stages: preprocess::Stages::from_flags(*validate_source, *convert, *validate_output),
                enable_day_check: *enable_day_check,
                output_dir: output_dir.clone(),
            };
            // Unlocked: worker threads log to stderr while the stages run.
            let mut stderr = std::io::stderr();
            preprocess::run(&mut stdout, &mut stderr, &config, path, &options)?.is_success()
        }
        Commands::Convert { file, year, json } => {
            convert::run(&mut stdout, &config, file, *year, *json)?;
            true
        }
        Commands::Validate {
            file,
            output,
            enable_day_check,
        } => validate::run(&mut stdout, &config, file, *output, *enable_day_check)?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
