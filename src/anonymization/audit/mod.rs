//! Audit logging module
//!
//! Appends one record per anonymize call. Original values are only ever
//! written as keyed HMAC-SHA256 hashes.

pub mod logger;

pub use logger::AuditLogger;
