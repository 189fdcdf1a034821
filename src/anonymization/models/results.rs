//! Result models for analysis and anonymization calls

use super::span::{EntityType, Span};
use crate::anonymization::preprocess::Expansion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit record for one rewritten span
///
/// The original value is only present when explicitly requested through
/// the operator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    /// Entity type of the rewritten span
    pub entity_type: EntityType,
    /// Operator name that produced the replacement
    pub operator: String,
    /// Span start in the source text
    pub start: usize,
    /// Span end in the source text
    pub end: usize,
    /// Replacement start in the output text
    pub output_start: usize,
    /// Replacement end in the output text
    pub output_end: usize,
    /// Length of the original text in bytes
    pub original_len: usize,
    /// Length of the replacement text in bytes
    pub replacement_len: usize,
    /// Original text, only when audit of originals is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

impl Replacement {
    /// Byte length delta introduced by this replacement
    pub fn delta(&self) -> isize {
        self.replacement_len as isize - self.original_len as isize
    }
}

/// Non-fatal problem recorded during a rewrite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteWarning {
    /// Entity type of the affected span
    pub entity_type: EntityType,
    /// Span start in the source text
    pub start: usize,
    /// Span end in the source text
    pub end: usize,
    /// Description (never contains the span text)
    pub message: String,
}

/// Output of an anonymization call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnonymizedText {
    /// Rewritten text
    pub text: String,
    /// Per-span audit trail, ordered by source offset
    pub replacements: Vec<Replacement>,
    /// Spans left untouched because their operator could not apply
    pub warnings: Vec<RewriteWarning>,
}

impl AnonymizedText {
    /// Total byte length delta across all replacements
    pub fn total_delta(&self) -> isize {
        self.replacements.iter().map(Replacement::delta).sum()
    }
}

/// Output of the analysis stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Text the spans refer to (differs from the input when acronyms were expanded)
    pub analyzed_text: String,
    /// Resolved spans, sorted by start offset
    pub spans: Vec<Span>,
    /// Acronym expansions applied before matching
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expansions: Vec<Expansion>,
}

/// Entity counts for one processed text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStatistics {
    /// Total number of resolved entities
    pub entity_count: usize,
    /// Count per entity type
    pub by_type: BTreeMap<EntityType, usize>,
}

impl EntityStatistics {
    /// Compute statistics from a resolved span set
    pub fn from_spans(spans: &[Span]) -> Self {
        let mut by_type = BTreeMap::new();
        for span in spans {
            *by_type.entry(span.entity_type.clone()).or_insert(0) += 1;
        }
        Self {
            entity_count: spans.len(),
            by_type,
        }
    }
}

/// Combined analysis and anonymization output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Analysis stage output
    pub analysis: Analysis,
    /// Anonymization stage output
    pub anonymized: AnonymizedText,
    /// Entity statistics
    pub statistics: EntityStatistics,
}
