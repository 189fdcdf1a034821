//! Integration tests for configuration loading and validation
//!
//! Tests that modify environment variables hold ENV_MUTEX.

use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use veil::anonymization::{AnonymizationEngine, CustomOperators, OperatorConfig};
use veil::config::{load_config, load_config_str};

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    std::env::remove_var("VEIL_ANALYSIS_MIN_SCORE_THRESHOLD");
    std::env::remove_var("VEIL_ANONYMIZATION_DEFAULT_OPERATOR");
    std::env::remove_var("VEIL_AUDIT_ENABLED");
    std::env::remove_var("TEST_VEIL_ENCRYPTION_KEY");
}

#[test]
fn test_load_complete_config() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_VEIL_ENCRYPTION_KEY", "from-the-environment");

    let toml_content = r##"
[application]
log_level = "debug"

[analysis]
min_score_threshold = 0.8
context_window = 60
active_entity_types = ["EMAIL_ADDRESS", "AU_MEDICARE"]
trim_entity_types = ["PERSON"]

[analysis.priorities]
EMAIL_ADDRESS = 99

[anonymization]
default_operator = "mask"
mask_char = "#"
hash_algorithm = "sha512"
hash_length = 100
encryption_key = "${TEST_VEIL_ENCRYPTION_KEY}"

[anonymization.operators]
AU_MEDICARE = "encrypt"

[audit]
enabled = false
json_format = false

[logging]
local_enabled = false
local_rotation = "hourly"
"##;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();

    let config = load_config(file.path()).expect("Failed to load config");
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.analysis.min_score_threshold, 0.8);
    assert_eq!(config.analysis.context_window, 60);
    assert_eq!(config.anonymization.mask_char, '#');
    assert_eq!(config.anonymization.hash_length, 100);
    assert_eq!(config.logging.local_rotation, "hourly");

    let engine = AnonymizationEngine::new(&config).unwrap();
    let operators =
        OperatorConfig::from_settings(&config.anonymization, &CustomOperators::new()).unwrap();
    let result = engine
        .anonymize("Contact jane@example.com now", &operators)
        .unwrap();
    assert_eq!(result.text, "Contact ####@#######.### now");

    cleanup_env_vars();
}

#[test]
fn test_environment_overrides_file_values() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("VEIL_ANALYSIS_MIN_SCORE_THRESHOLD", "0.9");
    std::env::set_var("VEIL_ANONYMIZATION_DEFAULT_OPERATOR", "redact");

    let config = load_config_str(
        r#"
[analysis]
min_score_threshold = 0.5

[anonymization]
default_operator = "hash"
"#,
    )
    .unwrap();
    assert_eq!(config.analysis.min_score_threshold, 0.9);
    assert_eq!(config.anonymization.default_operator, "redact");

    cleanup_env_vars();
}

#[test]
fn test_missing_placeholder_is_configuration_error() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let err = load_config_str(
        r#"
[anonymization]
encryption_key = "${TEST_VEIL_ENCRYPTION_KEY}"
"#,
    )
    .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("TEST_VEIL_ENCRYPTION_KEY"));
}

#[test]
fn test_invalid_values_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let cases = [
        "[analysis]\nmin_score_threshold = 1.5\n",
        "[anonymization]\nhash_length = 0\n",
        "[anonymization]\nhash_algorithm = \"md5\"\n",
        "[anonymization]\ndefault_operator = \"encrypt\"\n",
        "[logging]\nlocal_rotation = \"weekly\"\n",
        "[analysis]\nexpand_acronyms = true\n",
    ];
    for case in cases {
        let err = load_config_str(case).unwrap_err();
        assert!(err.is_configuration(), "expected configuration error for {case:?}");
    }
}

#[test]
fn test_audit_enabled_via_environment() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("VEIL_AUDIT_ENABLED", "true");

    let config = load_config_str("").unwrap();
    assert!(config.audit.enabled);

    std::env::set_var("VEIL_AUDIT_ENABLED", "sometimes");
    assert!(load_config_str("").is_err());

    cleanup_env_vars();
}
