//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Veil using clap.

pub mod commands;

use crate::config::{load_config, load_optional_config, VeilConfig};
use crate::domain::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "veil.toml";

/// Veil - PII detection and anonymization
#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(version, about, long_about = None)]
#[command(author = "Veil Contributors")]
pub struct Cli {
    /// Path to configuration file (defaults to ./veil.toml when present)
    #[arg(short, long, env = "VEIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "VEIL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Load the configuration named on the command line
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load_config(&self) -> Result<VeilConfig> {
        match &self.config {
            Some(path) => load_config(path),
            None => load_optional_config(Some(Path::new(DEFAULT_CONFIG_PATH)), false),
        }
    }

    /// Path shown in messages
    pub fn config_display(&self) -> String {
        self.config
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_CONFIG_PATH))
            .display()
            .to_string()
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect PII and print the resolved spans as JSON
    Analyze(commands::analyze::AnalyzeArgs),

    /// Anonymize one or more files
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Validate configuration and pattern catalog
    ValidateConfig(commands::validate::ValidateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_analyze() {
        let cli = Cli::parse_from(["veil", "analyze", "notes.txt", "--explain"]);
        assert!(cli.config.is_none());
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.input, "notes.txt");
                assert!(args.explain);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_anonymize() {
        let cli = Cli::parse_from([
            "veil",
            "--config",
            "custom.toml",
            "anonymize",
            "a.txt",
            "b.txt",
            "--output-dir",
            "out",
            "--concurrency",
            "8",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Anonymize(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.output_dir, Some(PathBuf::from("out")));
                assert_eq!(args.concurrency, 8);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["veil", "--log-level", "debug", "validate-config"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_anonymize_requires_input() {
        assert!(Cli::try_parse_from(["veil", "anonymize"]).is_err());
    }
}
