//! Main entry point for the storediff CLI

use clap::Parser;
use storediff::cli::Cli;
use storediff::commands::execute_command;

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging, raising the level when verbose is requested
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // Execute the command; exit 0 on identical snapshots, 1 on divergence,
    // 2 on any preparation or comparison failure
    match execute_command(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
