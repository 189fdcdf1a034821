// Veil - PII detection and anonymization
// Copyright (c) 2025 Veil Contributors
// Licensed under the MIT License

use clap::Parser;
use std::process;
use tokio::sync::watch;
use veil::cli::commands::{EXIT_CONFIG, EXIT_FATAL};
use veil::cli::{Cli, Commands};
use veil::config::{LoggingConfig, VeilConfig};
use veil::logging::init_logging;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = cli.load_config();

    // Logging follows the file's [logging] section when it loaded
    let (log_level, logging_config) = match &config {
        Ok(config) => (
            cli.log_level
                .clone()
                .unwrap_or_else(|| config.application.log_level.clone()),
            config.logging.clone(),
        ),
        Err(_) => (
            cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
            LoggingConfig::default(),
        ),
    };
    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Veil - PII detection and anonymization"
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, config = %cli.config_display(), "Configuration failed to load");
            eprintln!("Configuration error: {e}");
            process::exit(EXIT_CONFIG);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        } else {
            tracing::info!("Received SIGINT (Ctrl+C), finishing files in flight");
            eprintln!("\nShutdown signal received, finishing files in flight...");
            let _ = shutdown_tx.send(true);
        }
    });

    let exit_code = match execute_command(&cli, &config, shutdown_rx).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e:#}");
            EXIT_FATAL
        }
    };

    // process::exit skips destructors, so flush file logs first
    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(
    cli: &Cli,
    config: &VeilConfig,
    shutdown_signal: watch::Receiver<bool>,
) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Analyze(args) => args.execute(config).await,
        Commands::Anonymize(args) => args.execute(config, shutdown_signal).await,
        Commands::ValidateConfig(args) => args.execute(config, &cli.config_display()).await,
    }
}
