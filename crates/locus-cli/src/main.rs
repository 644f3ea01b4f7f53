use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod format;
mod util;

use cli::{Cli, Commands};
use commands::{cmd_config, cmd_headless, cmd_simulate};
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Quiet mode suppresses info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = cli.output.as_ref();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Simulate(args) => {
            let opts = FormatOptions::new(cli.no_color, args.format);
            cmd_simulate(&args, config_path, output, &opts).await?;
        }
        Commands::Headless { file, format } => {
            let opts = FormatOptions::new(cli.no_color, format);
            cmd_headless(&file, output, &opts).await?;
        }
        Commands::Config { action } => {
            cmd_config(action, config_path, output, cli.quiet)?;
        }
    }

    Ok(())
}
