//! Main entry point for tabrecon CLI

use clap::Parser;

mod cli;
mod commands;
mod output;
mod progress;

use cli::Cli;
use commands::execute_command;

fn main() {
    // Load environment variables from .env file if present
    if std::path::Path::new(".env").exists() {
        if let Err(e) = dotenv::dotenv() {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    // Initialize logging at the level --verbose asks for
    env_logger::Builder::from_default_env()
        .filter_level(log_level(cli.verbose))
        .init();

    if let Err(e) = execute_command(cli.command) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn log_level(verbose: bool) -> log::LevelFilter {
    if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}
