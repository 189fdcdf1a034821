// Veil - PII detection and anonymization
// Copyright (c) 2025 Veil Contributors
// Licensed under the MIT License

//! # Veil - PII detection and anonymization
//!
//! Veil finds personally identifiable information in free text and rewrites
//! it with configurable operators.
//!
//! ## Overview
//!
//! A document passes through five stages:
//! - **Detection** with a catalog of regex rules and optional recognizers
//! - **Filtering** of false positives (checksums, blacklists, plausibility)
//! - **Trimming** of stop words from span edges
//! - **Resolution** of overlapping spans by entity priority
//! - **Rewriting** with replace, redact, mask, hash, encrypt or age bracket
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`anonymization`] - Detection pipeline, operators and audit log
//! - [`domain`] - Error and result types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veil::anonymization::{AnonymizationEngine, CustomOperators, OperatorConfig};
//! use veil::config::load_config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("veil.toml")?;
//!     let engine = AnonymizationEngine::new(&config)?;
//!     let operators =
//!         OperatorConfig::from_settings(&config.anonymization, &CustomOperators::new())?;
//!
//!     let result = engine.anonymize("Call Jane Citizen on 0412 345 678", &operators)?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Explaining a detection
//!
//! ```rust,no_run
//! use veil::anonymization::AnonymizationEngine;
//!
//! # fn example() -> veil::domain::Result<()> {
//! let engine = AnonymizationEngine::with_defaults()?;
//! let text = "Medicare: 2123 45670 1";
//! for span in engine.analyze(text)? {
//!     let why = engine.explain(text, &span)?;
//!     println!("{} via {} ({:.2})", why.entity_type, why.source, why.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library calls return [`domain::VeilError`]; the binary wraps them with
//! `anyhow` context.
//!
//! ## Logging
//!
//! Veil logs with the `tracing` crate. Matched text is never logged.

pub mod anonymization;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
