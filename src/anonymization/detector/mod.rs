//! PII detection module
//!
//! Provides the rule-driven [`regex::PatternMatcher`] and a trait-based
//! interface for plugging in external named-entity recognizers.

pub mod context;
pub mod patterns;
pub mod regex;

use crate::anonymization::models::{DetectionMethod, EntityType, Span};
use crate::domain::Result;
use serde::{Deserialize, Serialize};

/// Raw entity reported by an external recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEntity {
    pub start: usize,
    pub end: usize,
    pub entity_type: EntityType,
    pub score: f32,
}

impl RecognizedEntity {
    pub fn new(start: usize, end: usize, entity_type: EntityType, score: f32) -> Self {
        Self {
            start,
            end,
            entity_type,
            score,
        }
    }
}

/// Trait for external entity recognizers (NER models and similar)
///
/// Implementations must be pure with respect to the input text so that one
/// instance can be shared across documents and threads.
pub trait EntityRecognizer: Send + Sync {
    /// Identifier reported as the `source` of produced spans
    fn name(&self) -> &str;

    /// Recognize entities in text
    fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>>;
}

/// Convert recognizer output into spans
///
/// Entries with inverted, empty, out-of-range or non-boundary offsets are
/// dropped with a warning.
pub fn spans_from_recognizer(
    recognizer_name: &str,
    text: &str,
    entities: Vec<RecognizedEntity>,
) -> Vec<Span> {
    entities
        .into_iter()
        .filter_map(|entity| {
            let span = Span::from_source(
                text,
                entity.start,
                entity.end,
                entity.entity_type.clone(),
                entity.score,
                recognizer_name,
            );
            if span.is_none() {
                tracing::warn!(
                    recognizer = recognizer_name,
                    entity_type = %entity.entity_type,
                    start = entity.start,
                    end = entity.end,
                    text_len = text.len(),
                    "Dropping recognizer entity with invalid offsets"
                );
            }
            span.map(|s| s.with_method(DetectionMethod::Ner))
        })
        .collect()
}
