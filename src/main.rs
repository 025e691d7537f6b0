use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use tapkit::cli::commands;
use tapkit::config::Config;
use tapkit::error::TapkitError;
use tapkit::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), TapkitError> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let format = cli.output.unwrap_or(config.general.default_output);

    let output = match cli.command {
        Commands::Queue(args) => commands::queue(&config, args.command, format)?,
        Commands::Completions { shell } => commands::completions(&shell)?,
    };

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
