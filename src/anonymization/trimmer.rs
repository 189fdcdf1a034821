//! Boundary trimming for name-like spans
//!
//! Greedy name expressions routinely swallow the label that follows a name
//! (`Bruno Aloi Subject`). The trimmer removes trailing stop-word tokens.

use crate::anonymization::models::{EntityType, Span};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default trailing stop words
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "subject", "re", "regarding", "for", "about", "status", "case", "date", "time", "matter",
    "issue", "type", "category", "claim", "policy", "number", "amount",
];

/// Trimming settings from the catalog
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrimmingDefinition {
    #[serde(default)]
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub stop_words: Vec<String>,
}

/// Strips trailing stop words from configured entity types
#[derive(Debug, Clone)]
pub struct BoundaryTrimmer {
    entity_types: HashSet<EntityType>,
    stop_words: HashSet<String>,
}

impl Default for BoundaryTrimmer {
    fn default() -> Self {
        Self::new(
            [EntityType::PERSON, EntityType::NAME_CONSULTANT],
            DEFAULT_STOP_WORDS.iter().copied(),
        )
    }
}

impl BoundaryTrimmer {
    pub fn new<T, S>(
        entity_types: impl IntoIterator<Item = T>,
        stop_words: impl IntoIterator<Item = S>,
    ) -> Self
    where
        T: Into<EntityType>,
        S: AsRef<str>,
    {
        Self {
            entity_types: entity_types.into_iter().map(Into::into).collect(),
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Build from a catalog definition; empty lists keep the defaults
    pub fn from_definition(definition: &TrimmingDefinition) -> Self {
        let defaults = Self::default();
        Self {
            entity_types: if definition.entity_types.is_empty() {
                defaults.entity_types
            } else {
                definition.entity_types.iter().map(EntityType::new).collect()
            },
            stop_words: if definition.stop_words.is_empty() {
                defaults.stop_words
            } else {
                definition
                    .stop_words
                    .iter()
                    .map(|w| w.trim().to_lowercase())
                    .collect()
            },
        }
    }

    /// Replace the set of trimmed entity types
    pub fn with_entity_types<T: Into<EntityType>>(
        mut self,
        entity_types: impl IntoIterator<Item = T>,
    ) -> Self {
        self.entity_types = entity_types.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether spans of this type are trimmed
    pub fn applies_to(&self, entity_type: &EntityType) -> bool {
        self.entity_types.contains(entity_type)
    }

    fn is_stop_word(&self, token: &str) -> bool {
        let bare = token.trim_end_matches(|c: char| matches!(c, ':' | ',' | '.'));
        self.stop_words.contains(&bare.to_lowercase())
    }

    /// Trim trailing stop words from a span
    ///
    /// Returns `None` when every token is a stop word. Spans of other types
    /// pass through unchanged. Trimming is idempotent.
    pub fn trim(&self, mut span: Span) -> Option<Span> {
        if !self.applies_to(&span.entity_type) {
            return Some(span);
        }

        let tokens = token_ranges(&span.text);
        let keep = tokens
            .iter()
            .rposition(|&(start, end)| !self.is_stop_word(&span.text[start..end]))?;

        let new_len = tokens[keep].1;
        if new_len < span.text.len() {
            span.text.truncate(new_len);
            span.end = span.start + new_len;
        }
        Some(span)
    }

    /// Trim every span, dropping those that trim to nothing
    pub fn trim_all(&self, spans: Vec<Span>) -> Vec<Span> {
        let before = spans.len();
        let trimmed: Vec<Span> = spans.into_iter().filter_map(|s| self.trim(s)).collect();
        if trimmed.len() != before {
            tracing::debug!(
                dropped = before - trimmed.len(),
                "Dropped spans consisting only of stop words"
            );
        }
        trimmed
    }
}

/// Byte ranges of whitespace-separated tokens
fn token_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut token_start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), token_start) {
            (true, Some(start)) => {
                ranges.push((start, i));
                token_start = None;
            }
            (false, None) => token_start = Some(i),
            _ => {}
        }
    }
    if let Some(start) = token_start {
        ranges.push((start, text.len()));
    }
    ranges
}
