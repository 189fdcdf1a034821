//! Configuration schema types
//!
//! This module defines the structure of `veil.toml`. Every section and key is
//! optional; an empty file yields the defaults.

use crate::anonymization::anonymizer::HashAlgorithm;
use crate::config::SecretString;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main Veil configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeilConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Detection settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Operator settings
    #[serde(default)]
    pub anonymization: AnonymizationConfig,

    /// Audit log settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VeilConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.analysis.validate()?;
        self.anonymization.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Candidates scoring below this are dropped
    #[serde(default = "default_min_score_threshold")]
    pub min_score_threshold: f32,

    /// Characters inspected on each side of a candidate
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Score added per supporting context keyword
    #[serde(default = "default_context_bonus")]
    pub context_bonus: f32,

    /// Score removed from `require_context` rules without supporting context
    #[serde(default = "default_missing_context_penalty")]
    pub missing_context_penalty: f32,

    /// Entity types to report; empty reports all
    #[serde(default)]
    pub active_entity_types: Vec<String>,

    /// Per-type score deltas applied after matching
    #[serde(default)]
    pub score_adjustment: HashMap<String, f32>,

    /// Entity types whose trailing stop words are trimmed
    #[serde(default)]
    pub trim_entity_types: Vec<String>,

    /// Custom pattern catalog replacing the embedded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Entity priority overrides
    #[serde(default)]
    pub priorities: HashMap<String, i32>,

    /// Expand acronyms before matching
    #[serde(default)]
    pub expand_acronyms: bool,

    /// Acronym to expansion table
    #[serde(default)]
    pub acronyms: HashMap<String, String>,

    /// Match acronyms case-sensitively
    #[serde(default = "default_true")]
    pub acronyms_case_sensitive: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_score_threshold: default_min_score_threshold(),
            context_window: default_context_window(),
            context_bonus: default_context_bonus(),
            missing_context_penalty: default_missing_context_penalty(),
            active_entity_types: Vec::new(),
            score_adjustment: HashMap::new(),
            trim_entity_types: Vec::new(),
            catalog: None,
            priorities: HashMap::new(),
            expand_acronyms: false,
            acronyms: HashMap::new(),
            acronyms_case_sensitive: true,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_score_threshold) {
            return Err(format!(
                "analysis.min_score_threshold must be between 0.0 and 1.0, got {}",
                self.min_score_threshold
            ));
        }
        if self.context_window == 0 {
            return Err("analysis.context_window must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.context_bonus) {
            return Err(format!(
                "analysis.context_bonus must be between 0.0 and 1.0, got {}",
                self.context_bonus
            ));
        }
        if !(0.0..=1.0).contains(&self.missing_context_penalty) {
            return Err(format!(
                "analysis.missing_context_penalty must be between 0.0 and 1.0, got {}",
                self.missing_context_penalty
            ));
        }
        if let Some((entity_type, delta)) = self
            .score_adjustment
            .iter()
            .find(|(_, delta)| !(-1.0..=1.0).contains(*delta))
        {
            return Err(format!(
                "analysis.score_adjustment.{entity_type} must be between -1.0 and 1.0, got {delta}"
            ));
        }
        if self.expand_acronyms && self.acronyms.is_empty() {
            return Err("analysis.expand_acronyms is set but no acronyms are defined".to_string());
        }
        Ok(())
    }
}

/// Operator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Operator for entity types without a mapping
    #[serde(default = "default_operator")]
    pub default_operator: String,

    /// Entity type to operator name
    #[serde(default)]
    pub operators: HashMap<String, String>,

    #[serde(default = "default_mask_char")]
    pub mask_char: char,

    /// Characters the mask operator leaves in place
    #[serde(default = "default_mask_preserve")]
    pub mask_preserve: Vec<char>,

    /// Keep the first character of each masked segment
    #[serde(default)]
    pub mask_keep_first: bool,

    #[serde(default = "default_redaction_literal")]
    pub redaction_literal: String,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Hex characters kept from the digest
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,

    /// Salt prepended before hashing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_salt: Option<SecretString>,

    /// Passphrase for the encrypt operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<SecretString>,

    /// Width of age brackets in years
    #[serde(default = "default_age_bracket_size")]
    pub age_bracket_size: u32,

    /// Date ages are computed at; today when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_reference_date: Option<NaiveDate>,

    /// Record original values in the replacement audit
    #[serde(default)]
    pub include_original_in_audit: bool,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            default_operator: default_operator(),
            operators: HashMap::new(),
            mask_char: default_mask_char(),
            mask_preserve: default_mask_preserve(),
            mask_keep_first: false,
            redaction_literal: default_redaction_literal(),
            hash_algorithm: HashAlgorithm::default(),
            hash_length: default_hash_length(),
            hash_salt: None,
            encryption_key: None,
            age_bracket_size: default_age_bracket_size(),
            age_reference_date: None,
            include_original_in_audit: false,
        }
    }
}

impl AnonymizationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.hash_length == 0 || self.hash_length > self.hash_algorithm.hex_len() {
            return Err(format!(
                "anonymization.hash_length must be between 1 and {} for {}, got {}",
                self.hash_algorithm.hex_len(),
                self.hash_algorithm,
                self.hash_length
            ));
        }
        if self.age_bracket_size == 0 {
            return Err("anonymization.age_bracket_size must be > 0".to_string());
        }

        let uses_encrypt = self.default_operator.trim().eq_ignore_ascii_case("encrypt")
            || self
                .operators
                .values()
                .any(|name| name.trim().eq_ignore_ascii_case("encrypt"));
        if uses_encrypt && self.encryption_key.is_none() {
            return Err(
                "anonymization.encryption_key is required when the encrypt operator is used"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default)]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_true")]
    pub json_format: bool,

    /// HMAC key for value hashes; falls back to `anonymization.hash_salt`,
    /// then to a random per-process key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_key: Option<SecretString>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_audit_log_path(),
            json_format: true,
            hash_key: None,
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            return Err("audit.log_path must be set when audit logging is enabled".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local JSON file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path must be set when local logging is enabled".to_string());
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_score_threshold() -> f32 {
    0.7
}

fn default_context_window() -> usize {
    40
}

fn default_context_bonus() -> f32 {
    0.1
}

fn default_missing_context_penalty() -> f32 {
    0.2
}

fn default_operator() -> String {
    "replace".to_string()
}

fn default_mask_char() -> char {
    '*'
}

fn default_mask_preserve() -> Vec<char> {
    vec!['@', '.']
}

fn default_redaction_literal() -> String {
    "[REDACTED]".to_string()
}

fn default_hash_length() -> usize {
    16
}

fn default_age_bracket_size() -> u32 {
    5
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/veil.log")
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config: VeilConfig = toml::from_str("").unwrap();
        config.validate().unwrap();

        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.analysis.min_score_threshold, 0.7);
        assert_eq!(config.analysis.context_window, 40);
        assert_eq!(config.anonymization.default_operator, "replace");
        assert_eq!(config.anonymization.mask_preserve, vec!['@', '.']);
        assert_eq!(config.anonymization.hash_algorithm, HashAlgorithm::Sha256);
        assert!(!config.audit.enabled);
        assert!(config.audit.json_format);
        assert_eq!(config.logging.local_rotation, "daily");
    }

    #[test]
    fn test_full_anonymization_section() {
        let config: VeilConfig = toml::from_str(
            r##"
[anonymization]
default_operator = "redact"
mask_char = "#"
hash_algorithm = "sha512"
hash_length = 32
encryption_key = "passphrase"
age_reference_date = "2024-06-15"

[anonymization.operators]
EMAIL_ADDRESS = "mask"
AU_TFN = "encrypt"
"##,
        )
        .unwrap();
        config.validate().unwrap();

        let anonymization = &config.anonymization;
        assert_eq!(anonymization.mask_char, '#');
        assert_eq!(anonymization.hash_algorithm, HashAlgorithm::Sha512);
        assert_eq!(anonymization.operators.get("AU_TFN").map(String::as_str), Some("encrypt"));
        assert_eq!(anonymization.age_reference_date, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert!(!format!("{config:?}").contains("passphrase"));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = VeilConfig::default();
        config.analysis.min_score_threshold = 1.5;
        assert!(config.validate().unwrap_err().contains("min_score_threshold"));
    }

    #[test]
    fn test_encrypt_without_key() {
        let mut config = VeilConfig::default();
        config
            .anonymization
            .operators
            .insert("AU_TFN".to_string(), "encrypt".to_string());
        assert!(config.validate().unwrap_err().contains("encryption_key"));
    }

    #[test]
    fn test_hash_length_bounds() {
        let mut config = VeilConfig::default();
        config.anonymization.hash_length = 65;
        assert!(config.validate().is_err());

        config.anonymization.hash_algorithm = HashAlgorithm::Sha512;
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_rotation_and_level() {
        let mut config = VeilConfig::default();
        config.logging.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());

        let mut config = VeilConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_acronyms_requires_table() {
        let mut config = VeilConfig::default();
        config.analysis.expand_acronyms = true;
        assert!(config.validate().is_err());

        config
            .analysis
            .acronyms
            .insert("DOB".to_string(), "Date of Birth".to_string());
        config.validate().unwrap();
    }
}
