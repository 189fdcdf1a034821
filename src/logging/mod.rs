//! Logging and observability
//!
//! Structured logging through `tracing`. Span text never appears in log
//! fields; only entity types, counts, offsets and lengths do.
//!
//! # Example
//!
//! ```no_run
//! use veil::logging::init_logging;
//! use veil::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the completion of an analysis call
///
/// # Example
///
/// ```no_run
/// use veil::log_analysis_complete;
/// use std::time::Duration;
///
/// log_analysis_complete!(12, 3, Duration::from_millis(4));
/// ```
#[macro_export]
macro_rules! log_analysis_complete {
    ($candidates:expr, $resolved:expr, $duration:expr) => {
        tracing::debug!(
            candidates = $candidates,
            resolved = $resolved,
            duration_ms = $duration.as_millis() as u64,
            "Analysis completed"
        );
    };
}

/// Log the completion of an anonymization call
///
/// # Example
///
/// ```no_run
/// use veil::log_anonymization_complete;
/// use std::time::Duration;
///
/// log_anonymization_complete!(3, 0, Duration::from_millis(2));
/// ```
#[macro_export]
macro_rules! log_anonymization_complete {
    ($replacements:expr, $warnings:expr, $duration:expr) => {
        tracing::debug!(
            replacements = $replacements,
            warnings = $warnings,
            duration_ms = $duration.as_millis() as u64,
            "Anonymization completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use veil::log_error_with_context;
/// use veil::domain::VeilError;
///
/// let error = VeilError::Configuration("Unknown operator".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log progress through a batch of documents
///
/// # Example
///
/// ```no_run
/// use veil::log_batch_progress;
///
/// log_batch_progress!(10, 40);
/// ```
#[macro_export]
macro_rules! log_batch_progress {
    ($current:expr, $total:expr) => {
        tracing::info!(
            current = $current,
            total = $total,
            progress_pct = ($current as f64 / ($total as f64).max(1.0) * 100.0),
            "Processing documents"
        );
    };
}
