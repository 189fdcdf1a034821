//! Configuration management for Veil.
//!
//! This module provides TOML-based configuration loading, parsing, and
//! validation.
//!
//! # Overview
//!
//! Veil reads an optional `veil.toml` with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `VEIL_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use veil::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("veil.toml")?;
//! println!("Threshold: {}", config.analysis.min_score_threshold);
//! println!("Default operator: {}", config.anonymization.default_operator);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`AnalysisConfig`] - Thresholds, context scoring, catalog, acronyms
//! - [`AnonymizationConfig`] - Operators and their parameters
//! - [`AuditConfig`] - Replacement audit log
//! - [`LoggingConfig`] - Local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [analysis]
//! min_score_threshold = 0.7
//! active_entity_types = ["PERSON", "AU_TFN", "AU_MEDICARE"]
//!
//! [anonymization]
//! default_operator = "replace"
//! encryption_key = "${VEIL_ENCRYPTION_KEY}"
//!
//! [anonymization.operators]
//! EMAIL_ADDRESS = "mask"
//! AU_TFN = "encrypt"
//! DATE_OF_BIRTH = "age_bracket"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_str, load_optional_config};
pub use schema::{
    AnalysisConfig, AnonymizationConfig, ApplicationConfig, AuditConfig, LoggingConfig,
    VeilConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
