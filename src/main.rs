use anyhow::Result;
use clap::Parser;

// Core modules
mod cli;
mod commands;
mod config;
mod tools;

// Chart handling
mod chart;
mod values;

// Architecture modules
mod diagnostics;
mod domain;
mod error;
mod infrastructure;
mod services;
mod ui;
mod validation;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Cli::parse().into_options();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if opts.verbose() {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false) // Disable ANSI escape codes for cleaner output
        .init();

    if let Err(e) = commands::spray::execute(opts).await {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
