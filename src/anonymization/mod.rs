//! PII detection and anonymization
//!
//! # Architecture
//!
//! The pipeline consists of:
//! - **Detection**: catalog rules ([`detector::regex::PatternMatcher`]) plus
//!   pluggable [`detector::EntityRecognizer`]s, with context scoring
//! - **Filtering**: validators, blacklists and plausibility checks
//!   ([`filter::FalsePositiveFilter`]) and stop-word trimming ([`trimmer`])
//! - **Resolution**: one winner per overlap cluster ([`resolver`])
//! - **Rewrite**: operator-driven single-pass substitution ([`rewriter`])
//! - **Audit**: hashed replacement records ([`audit`])
//!
//! # Usage
//!
//! ```rust,no_run
//! use veil::anonymization::{AnonymizationEngine, Operator, OperatorConfig};
//! use veil::anonymization::models::EntityType;
//!
//! # fn example() -> veil::domain::Result<()> {
//! let engine = AnonymizationEngine::with_defaults()?;
//! let operators = OperatorConfig::new().with_operator(EntityType::EMAIL_ADDRESS, Operator::Mask);
//! let result = engine.process("Contact jane@example.com", &operators)?;
//! println!("{}", result.anonymized.text);
//! # Ok(())
//! # }
//! ```

pub mod anonymizer;
pub mod audit;
pub mod catalog;
pub mod detector;
pub mod engine;
pub mod filter;
pub mod models;
pub mod preprocess;
pub mod resolver;
pub mod rewriter;
pub mod trimmer;
pub mod validators;

// Re-export main types
pub use anonymizer::{CustomOperators, Operator, OperatorConfig, OperatorParams};
pub use catalog::Catalog;
pub use engine::{AnonymizationEngine, DetectionExplanation, EngineBuilder};
pub use models::{AnonymizedText, ProcessResult, Span};
pub use rewriter::rewrite;
