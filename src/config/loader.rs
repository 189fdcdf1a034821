//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::VeilConfig;
use super::secret::secret_string;
use crate::anonymization::anonymizer::HashAlgorithm;
use crate::domain::{Result, VeilError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static ENV_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid placeholder regex"));

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into VeilConfig
/// 4. Applies environment variable overrides (VEIL_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Every failure is reported as [`VeilError::Configuration`].
///
/// # Examples
///
/// ```no_run
/// use veil::config::load_config;
///
/// let config = load_config("veil.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<VeilConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(VeilError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        VeilError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Load configuration from TOML text, with substitution, overrides and validation
pub fn load_config_str(contents: &str) -> Result<VeilConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: VeilConfig = toml::from_str(&contents)
        .map_err(|e| VeilError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        VeilError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Load a configuration file when one is given and present, defaults otherwise
///
/// Environment overrides apply in both cases. An explicitly named file that
/// does not exist is still an error.
pub fn load_optional_config(path: Option<&Path>, required: bool) -> Result<VeilConfig> {
    match path {
        Some(path) if required || path.exists() => load_config(path),
        _ => load_config_str(""),
    }
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched. All missing variables are reported
/// together.
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            continue;
        }

        let processed = ENV_PLACEHOLDER.replace_all(line, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
    }

    if !missing_vars.is_empty() {
        return Err(VeilError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        VeilError::Configuration(format!("Invalid value for {name}: {e}"))
    })
}

/// Applies environment variable overrides using VEIL_* prefix
///
/// Environment variables follow the pattern `VEIL_<SECTION>_<KEY>`, for
/// example `VEIL_ANALYSIS_MIN_SCORE_THRESHOLD`. Unparseable values are
/// configuration errors.
fn apply_env_overrides(config: &mut VeilConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("VEIL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val.trim().to_lowercase();
    }

    // Analysis overrides
    if let Some(val) = var("VEIL_ANALYSIS_MIN_SCORE_THRESHOLD") {
        config.analysis.min_score_threshold = parse_env("VEIL_ANALYSIS_MIN_SCORE_THRESHOLD", &val)?;
    }
    if let Some(val) = var("VEIL_ANALYSIS_CONTEXT_WINDOW") {
        config.analysis.context_window = parse_env("VEIL_ANALYSIS_CONTEXT_WINDOW", &val)?;
    }
    if let Some(val) = var("VEIL_ANALYSIS_ACTIVE_ENTITY_TYPES") {
        config.analysis.active_entity_types = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(val) = var("VEIL_ANALYSIS_CATALOG") {
        config.analysis.catalog = Some(PathBuf::from(val));
    }
    if let Some(val) = var("VEIL_ANALYSIS_EXPAND_ACRONYMS") {
        config.analysis.expand_acronyms = parse_env("VEIL_ANALYSIS_EXPAND_ACRONYMS", &val)?;
    }

    // Anonymization overrides
    if let Some(val) = var("VEIL_ANONYMIZATION_DEFAULT_OPERATOR") {
        config.anonymization.default_operator = val;
    }
    if let Some(val) = var("VEIL_ANONYMIZATION_HASH_ALGORITHM") {
        config.anonymization.hash_algorithm = HashAlgorithm::from_str(&val)?;
    }
    if let Some(val) = var("VEIL_ANONYMIZATION_HASH_LENGTH") {
        config.anonymization.hash_length = parse_env("VEIL_ANONYMIZATION_HASH_LENGTH", &val)?;
    }
    if let Some(val) = var("VEIL_ANONYMIZATION_HASH_SALT") {
        config.anonymization.hash_salt = Some(secret_string(val));
    }
    if let Some(val) = var("VEIL_ANONYMIZATION_ENCRYPTION_KEY") {
        config.anonymization.encryption_key = Some(secret_string(val));
    }
    if let Some(val) = var("VEIL_ANONYMIZATION_AGE_BRACKET_SIZE") {
        config.anonymization.age_bracket_size =
            parse_env("VEIL_ANONYMIZATION_AGE_BRACKET_SIZE", &val)?;
    }

    // Audit overrides
    if let Some(val) = var("VEIL_AUDIT_ENABLED") {
        config.audit.enabled = parse_env("VEIL_AUDIT_ENABLED", &val)?;
    }
    if let Some(val) = var("VEIL_AUDIT_LOG_PATH") {
        config.audit.log_path = PathBuf::from(val);
    }
    if let Some(val) = var("VEIL_AUDIT_HASH_KEY") {
        config.audit.hash_key = Some(secret_string(val));
    }

    // Logging overrides
    if let Some(val) = var("VEIL_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("VEIL_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("VEIL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Serializes tests that touch process environment
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_substitute_env_vars() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("VEIL_TEST_SUBST_KEY", "s3cret");

        let input = "encryption_key = \"${VEIL_TEST_SUBST_KEY}\"\r\n# ${VEIL_TEST_UNSET_IN_COMMENT}\n";
        let output = substitute_env_vars(input).unwrap();
        assert_eq!(
            output,
            "encryption_key = \"s3cret\"\r\n# ${VEIL_TEST_UNSET_IN_COMMENT}\n"
        );

        std::env::remove_var("VEIL_TEST_SUBST_KEY");
    }

    #[test]
    fn test_missing_env_vars_reported_together() {
        let err = substitute_env_vars("a = \"${VEIL_TEST_MISSING_A}\"\nb = \"${VEIL_TEST_MISSING_B}\"")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("VEIL_TEST_MISSING_A"));
        assert!(message.contains("VEIL_TEST_MISSING_B"));
    }

    #[test]
    fn test_load_config_file() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[application]
log_level = "debug"

[analysis]
min_score_threshold = 0.6
active_entity_types = ["PERSON", "AU_TFN"]
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.analysis.min_score_threshold, 0.6);
        assert_eq!(config.analysis.active_entity_types.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/veil.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_env_override_and_parse_error() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        std::env::set_var("VEIL_ANALYSIS_CONTEXT_WINDOW", "64");
        let config = load_config_str("").unwrap();
        assert_eq!(config.analysis.context_window, 64);

        std::env::set_var("VEIL_ANALYSIS_CONTEXT_WINDOW", "wide");
        let err = load_config_str("").unwrap_err();
        assert!(err.to_string().contains("VEIL_ANALYSIS_CONTEXT_WINDOW"));

        std::env::remove_var("VEIL_ANALYSIS_CONTEXT_WINDOW");
    }

    #[test]
    fn test_optional_config() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let missing = Path::new("/nonexistent/veil.toml");

        let config = load_optional_config(Some(missing), false).unwrap();
        assert_eq!(config.anonymization.default_operator, "replace");
        assert!(load_optional_config(Some(missing), true).is_err());
        assert!(load_optional_config(None, false).is_ok());
    }
}
