//! Validate config command implementation
//!
//! Loads the configuration, compiles the pattern catalog and resolves every
//! operator name, reporting the first problem found.

use super::{EXIT_CONFIG, EXIT_OK};
use crate::anonymization::{AnonymizationEngine, CustomOperators, OperatorConfig};
use crate::config::VeilConfig;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config: &VeilConfig, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration: {config_path}");

        let engine = match AnonymizationEngine::new(config) {
            Ok(engine) => engine,
            Err(e) => {
                println!("Pattern catalog is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Err(e) = OperatorConfig::from_settings(&config.anonymization, &CustomOperators::new())
        {
            println!("Operator configuration is invalid");
            println!("   Error: {e}");
            return Ok(EXIT_CONFIG);
        }

        let catalog = config
            .analysis
            .catalog
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "embedded".to_string());

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Catalog: {catalog}");
        println!("  Rules: {}", engine.rule_count());
        println!("  Score Threshold: {}", config.analysis.min_score_threshold);
        println!("  Context Window: {}", config.analysis.context_window);
        println!("  Default Operator: {}", config.anonymization.default_operator);
        println!("  Operator Overrides: {}", config.anonymization.operators.len());
        println!(
            "  Encryption Key: {}",
            if config.anonymization.encryption_key.is_some() {
                "configured"
            } else {
                "not set"
            }
        );
        println!("  Audit Log: {}", config.audit.enabled);
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_configuration_is_valid() {
        let code = ValidateArgs {}
            .execute(&VeilConfig::default(), "veil.toml")
            .await
            .unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[tokio::test]
    async fn test_unknown_operator_is_configuration_error() {
        let mut config = VeilConfig::default();
        config.anonymization.default_operator = "scramble".to_string();
        let code = ValidateArgs {}.execute(&config, "veil.toml").await.unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
