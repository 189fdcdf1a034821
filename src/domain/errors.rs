//! Domain error types
//!
//! This module defines the error hierarchy for Veil. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Veil error type
///
/// This is the primary error type used throughout the library. Configuration
/// and rewrite failures are always surfaced to the caller; per-span detection
/// anomalies are recovered inside the pipeline and never reach this type.
#[derive(Debug, Error)]
pub enum VeilError {
    /// Configuration-related errors (bad rule expression, unknown operator, missing key)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rewriter offset or ordering defect; the document must not be emitted
    #[error("Rewrite error: {0}")]
    Rewrite(String),

    /// Encryption or decryption failures
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl VeilError {
    /// Returns true for errors caused by invalid configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, VeilError::Configuration(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for VeilError {
    fn from(err: std::io::Error) -> Self {
        VeilError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for VeilError {
    fn from(err: serde_json::Error) -> Self {
        VeilError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for VeilError {
    fn from(err: toml::de::Error) -> Self {
        VeilError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veil_error_display() {
        let err = VeilError::Configuration("Unknown operator 'scramble'".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown operator 'scramble'"
        );
    }

    #[test]
    fn test_rewrite_error_display() {
        let err = VeilError::Rewrite("span text mismatch at 4..9".to_string());
        assert_eq!(err.to_string(), "Rewrite error: span text mismatch at 4..9");
    }

    #[test]
    fn test_is_configuration() {
        assert!(VeilError::Configuration("x".to_string()).is_configuration());
        assert!(!VeilError::Rewrite("x".to_string()).is_configuration());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VeilError = io_err.into();
        assert!(matches!(err, VeilError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("key = ").unwrap_err();
        let err: VeilError = toml_err.into();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&VeilError::Other("x".to_string()));
    }
}
