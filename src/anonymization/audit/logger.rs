//! Audit logger for anonymization calls

use crate::anonymization::models::AnonymizedText;
use crate::config::SecretString;
use crate::domain::{Result, VeilError};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

const HASH_KEY_CONTEXT: &[u8] = b"veil-audit-value-hash-v1";

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    document_id: String,
    replacements_count: usize,
    warnings_count: usize,
    processing_time_ms: u64,
    replacements: Vec<AuditReplacement>,
}

/// Audit replacement entry (with hashed PII)
#[derive(Debug, Serialize)]
struct AuditReplacement {
    entity_type: String,
    operator: String,
    start: usize,
    end: usize,
    original_len: usize,
    replacement_len: usize,
    /// HMAC-SHA256 of the original value (never log plaintext PII)
    value_hash: String,
}

/// Append-only audit log
///
/// Safe to share between workers; writes are serialized per logger.
/// Values are hashed with a keyed HMAC so short identifiers cannot be
/// recovered by enumeration. Without a configured key a random one is drawn
/// per logger, and hashes only correlate within that process.
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
    hash_key: Secret<[u8; 32]>,
    write_lock: Mutex<()>,
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("log_path", &self.log_path)
            .field("json_format", &self.json_format)
            .field("enabled", &self.enabled)
            .field("hash_key", &"[REDACTED]")
            .finish()
    }
}

impl AuditLogger {
    /// Create a new audit logger, creating the parent directory when enabled
    pub fn new(log_path: impl Into<PathBuf>, json_format: bool, enabled: bool) -> Result<Self> {
        let log_path = log_path.into();
        if enabled {
            if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    VeilError::Io(format!(
                        "Failed to create audit log directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        Ok(Self {
            log_path,
            json_format,
            enabled,
            hash_key: Secret::new(key),
            write_lock: Mutex::new(()),
        })
    }

    /// Derive the value-hash key from a configured secret
    ///
    /// Loggers sharing a secret produce comparable hashes across runs.
    pub fn with_hash_key(mut self, secret: &SecretString) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(HASH_KEY_CONTEXT);
        hasher.update(secret.expose_secret().as_str().as_bytes());
        self.hash_key = Secret::new(hasher.finalize().into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Record an anonymize call
    ///
    /// `source` is the text the replacements' offsets refer to; it is only
    /// used to hash the original values.
    pub fn log_anonymization(
        &self,
        document_id: &str,
        anonymized: &AnonymizedText,
        source: &str,
        processing_time_ms: u64,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let replacements = anonymized
            .replacements
            .iter()
            .map(|r| -> Result<AuditReplacement> {
                Ok(AuditReplacement {
                    entity_type: r.entity_type.to_string(),
                    operator: r.operator.clone(),
                    start: r.start,
                    end: r.end,
                    original_len: r.original_len,
                    replacement_len: r.replacement_len,
                    value_hash: self.hash_value(source.get(r.start..r.end).unwrap_or_default())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let entry = AuditLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            document_id: document_id.to_string(),
            replacements_count: anonymized.replacements.len(),
            warnings_count: anonymized.warnings.len(),
            processing_time_ms,
            replacements,
        };

        self.write_entry(&entry)
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let line = if self.json_format {
            serde_json::to_string(entry)?
        } else {
            let types: Vec<&str> = entry
                .replacements
                .iter()
                .map(|r| r.entity_type.as_str())
                .collect();
            format!(
                "[{}] Document: {} | Replacements: {} | Warnings: {} | Types: {} | Time: {}ms",
                entry.timestamp,
                entry.document_id,
                entry.replacements_count,
                entry.warnings_count,
                types.join(","),
                entry.processing_time_ms
            )
        };

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| VeilError::Other("Audit log lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                VeilError::Io(format!(
                    "Failed to open audit log {}: {e}",
                    self.log_path.display()
                ))
            })?;
        writeln!(file, "{line}")
            .map_err(|e| VeilError::Io(format!("Failed to write audit entry: {e}")))?;

        Ok(())
    }
}

impl AuditLogger {
    /// Keyed hash of a PII value, hex encoded
    fn hash_value(&self, value: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.hash_key.expose_secret())
            .map_err(|e| VeilError::Other(format!("Invalid audit hash key: {e}")))?;
        mac.update(value.as_bytes());
        Ok(format!("{:x}", mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::models::{EntityType, Replacement};
    use crate::config::secret_string;
    use tempfile::tempdir;

    fn plain_sha256(value: &str) -> String {
        format!("{:x}", Sha256::digest(value.as_bytes()))
    }

    fn anonymized() -> (String, AnonymizedText) {
        let source = "Contact test@example.com".to_string();
        let text = AnonymizedText {
            text: "Contact <EMAIL_ADDRESS>".to_string(),
            replacements: vec![Replacement {
                entity_type: EntityType::EMAIL_ADDRESS,
                operator: "replace".to_string(),
                start: 8,
                end: 24,
                output_start: 8,
                output_end: 23,
                original_len: 16,
                replacement_len: 15,
                original: None,
            }],
            warnings: Vec::new(),
        };
        (source, text)
    }

    #[test]
    fn test_value_hash_is_keyed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("veil.log");
        let key = secret_string("audit-key");
        let a = AuditLogger::new(&path, true, false).unwrap().with_hash_key(&key);
        let b = AuditLogger::new(&path, true, false).unwrap().with_hash_key(&key);
        let random = AuditLogger::new(&path, true, false).unwrap();

        let hash = a.hash_value("123456782").unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, b.hash_value("123456782").unwrap());
        assert_ne!(hash, a.hash_value("123456783").unwrap());
        assert_ne!(hash, random.hash_value("123456782").unwrap());
        assert_ne!(hash, plain_sha256("123456782"));
    }

    #[test]
    fn test_debug_hides_key() {
        let logger = AuditLogger::new("veil.log", true, false)
            .unwrap()
            .with_hash_key(&secret_string("audit-key"));
        let debug = format!("{logger:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("audit-key"));
    }

    #[test]
    fn test_log_anonymization_json() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit").join("veil.log");
        let logger = AuditLogger::new(&log_path, true, true).unwrap();
        let (source, text) = anonymized();

        logger.log_anonymization("doc-123", &text, &source, 3).unwrap();
        logger.log_anonymization("doc-456", &text, &source, 4).unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("doc-123"));
        assert!(content.contains(&logger.hash_value("test@example.com").unwrap()));
        assert!(!content.contains(&plain_sha256("test@example.com")));
        assert!(!content.contains("test@example.com"));

        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["replacements_count"], 1);
        assert_eq!(first["replacements"][0]["entity_type"], "EMAIL_ADDRESS");
    }

    #[test]
    fn test_plain_text_format() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("veil.log");
        let logger = AuditLogger::new(&log_path, false, true).unwrap();
        let (source, text) = anonymized();

        logger.log_anonymization("doc-1", &text, &source, 0).unwrap();
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Document: doc-1 | Replacements: 1"));
        assert!(!content.contains("test@example.com"));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("nested").join("veil.log");
        let logger = AuditLogger::new(&log_path, true, false).unwrap();
        let (source, text) = anonymized();

        logger.log_anonymization("doc", &text, &source, 0).unwrap();
        assert!(!log_path.exists());
        assert!(!dir.path().join("nested").exists());
    }
}
