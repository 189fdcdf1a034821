//! Context window scoring
//!
//! Looks at the text surrounding a candidate span for supporting keywords,
//! leading labels (e.g. `Medicare:` immediately before the value) and
//! contradicting labels (e.g. a state code before a four-digit DATE).

use crate::anonymization::models::{EntityType, Span};
use crate::domain::{Result, VeilError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Context profile definition from the catalog
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContextDefinition {
    /// Supporting keywords (case-insensitive substring match)
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Patterns matched against the text before the span, usually anchored with `$`
    #[serde(default)]
    pub leading: Vec<String>,
    /// Patterns on the text before the span that rule the candidate out
    #[serde(default)]
    pub contradicting: Vec<String>,
}

#[derive(Debug, Clone)]
struct ContextProfile {
    keywords: Vec<String>,
    leading: Vec<Regex>,
    contradicting: Vec<Regex>,
}

/// Text before and after a span, bounded by a character budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow<'a> {
    pub before: &'a str,
    pub after: &'a str,
}

impl<'a> ContextWindow<'a> {
    /// Build a window of up to `size` characters on each side of `[start, end)`
    ///
    /// Offsets that are out of range or off a char boundary yield an empty side.
    pub fn around(text: &'a str, start: usize, end: usize, size: usize) -> Self {
        let before = text
            .get(..start)
            .map(|head| {
                let from = head
                    .char_indices()
                    .rev()
                    .take(size)
                    .last()
                    .map(|(i, _)| i)
                    .unwrap_or(head.len());
                &head[from..]
            })
            .unwrap_or("");
        let after = text
            .get(end..)
            .map(|tail| {
                let to = tail
                    .char_indices()
                    .nth(size)
                    .map(|(i, _)| i)
                    .unwrap_or(tail.len());
                &tail[..to]
            })
            .unwrap_or("");
        Self { before, after }
    }

    /// Window around an existing span
    pub fn for_span(text: &'a str, span: &Span, size: usize) -> Self {
        Self::around(text, span.start, span.end, size)
    }

    fn contains_keyword(&self, keyword_lower: &str) -> bool {
        self.before.to_lowercase().contains(keyword_lower)
            || self.after.to_lowercase().contains(keyword_lower)
    }
}

/// Result of a context assessment
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextAdjustment {
    /// Score delta to apply
    pub delta: f32,
    /// A contradicting label was found; the candidate must be dropped
    pub contradicted: bool,
}

/// Evidence that fired for a span, used for explanations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextEvidence {
    pub keywords: Vec<String>,
    pub leading: Vec<String>,
    pub contradicting: Vec<String>,
}

/// Per-entity-type context scorer
///
/// Profiles are built once and never mutated, so a scorer can be shared
/// across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ContextScorer {
    profiles: HashMap<EntityType, ContextProfile>,
    bonus: f32,
}

impl ContextScorer {
    /// Create a scorer with no profiles
    pub fn new(bonus: f32) -> Self {
        Self {
            profiles: HashMap::new(),
            bonus,
        }
    }

    /// Build a scorer from catalog definitions
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any leading or contradicting pattern
    /// fails to compile.
    pub fn from_definitions(
        definitions: &HashMap<String, ContextDefinition>,
        bonus: f32,
    ) -> Result<Self> {
        let mut scorer = Self::new(bonus);
        for (name, definition) in definitions {
            scorer.add_profile(EntityType::new(name), definition)?;
        }
        Ok(scorer)
    }

    /// Add (or replace) the profile for an entity type
    pub fn add_profile(
        &mut self,
        entity_type: EntityType,
        definition: &ContextDefinition,
    ) -> Result<()> {
        let compile = |patterns: &[String], kind: &str| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(&format!("(?i){p}")).map_err(|e| {
                        VeilError::Configuration(format!(
                            "Invalid {kind} context pattern for {entity_type}: {p}: {e}"
                        ))
                    })
                })
                .collect()
        };

        let profile = ContextProfile {
            keywords: definition
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            leading: compile(&definition.leading, "leading")?,
            contradicting: compile(&definition.contradicting, "contradicting")?,
        };
        self.profiles.insert(entity_type, profile);
        Ok(())
    }

    /// Bonus applied per piece of supporting evidence
    pub fn bonus(&self) -> f32 {
        self.bonus
    }

    /// Score adjustment for a candidate of `entity_type` seen through `window`
    ///
    /// A supporting keyword adds one bonus, a leading label adds two.
    /// Contradictions are reported, not scored.
    pub fn score_adjustment(
        &self,
        window: &ContextWindow<'_>,
        entity_type: &EntityType,
    ) -> ContextAdjustment {
        let Some(profile) = self.profiles.get(entity_type) else {
            return ContextAdjustment::default();
        };

        let mut delta = 0.0;
        if profile.keywords.iter().any(|k| window.contains_keyword(k)) {
            delta += self.bonus;
        }
        if profile.leading.iter().any(|re| re.is_match(window.before)) {
            delta += 2.0 * self.bonus;
        }
        let contradicted = profile
            .contradicting
            .iter()
            .any(|re| re.is_match(window.before));

        ContextAdjustment {
            delta,
            contradicted,
        }
    }

    /// Adjustment for rule-level keywords
    ///
    /// Returns the bonus if any keyword is present, `-penalty` if none is
    /// present and context is required, zero otherwise.
    pub fn keyword_adjustment(
        &self,
        window: &ContextWindow<'_>,
        keywords: &[String],
        required: bool,
        penalty: f32,
    ) -> f32 {
        if keywords.is_empty() {
            return 0.0;
        }
        if keywords.iter().any(|k| window.contains_keyword(k)) {
            self.bonus
        } else if required {
            -penalty
        } else {
            0.0
        }
    }

    /// Check only for contradicting labels
    pub fn is_contradicted(&self, window: &ContextWindow<'_>, entity_type: &EntityType) -> bool {
        self.profiles.get(entity_type).is_some_and(|profile| {
            profile
                .contradicting
                .iter()
                .any(|re| re.is_match(window.before))
        })
    }

    /// Describe which evidence fired for a span
    pub fn evidence(&self, window: &ContextWindow<'_>, entity_type: &EntityType) -> ContextEvidence {
        let Some(profile) = self.profiles.get(entity_type) else {
            return ContextEvidence::default();
        };
        ContextEvidence {
            keywords: profile
                .keywords
                .iter()
                .filter(|k| window.contains_keyword(k))
                .cloned()
                .collect(),
            leading: profile
                .leading
                .iter()
                .filter(|re| re.is_match(window.before))
                .map(|re| re.as_str().trim_start_matches("(?i)").to_string())
                .collect(),
            contradicting: profile
                .contradicting
                .iter()
                .filter(|re| re.is_match(window.before))
                .map(|re| re.as_str().trim_start_matches("(?i)").to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ContextScorer {
        let mut definitions = HashMap::new();
        definitions.insert(
            "AU_MEDICARE".to_string(),
            ContextDefinition {
                keywords: vec!["medicare".to_string(), "health card".to_string()],
                leading: vec![r"medicare\s*(?:number|#|:)?\s*$".to_string()],
                contradicting: vec![],
            },
        );
        definitions.insert(
            "DATE".to_string(),
            ContextDefinition {
                keywords: vec![],
                leading: vec![],
                contradicting: vec![r"(?:NSW|VIC|QLD|WA|SA|TAS|NT|ACT)\s*$".to_string()],
            },
        );
        ContextScorer::from_definitions(&definitions, 0.1).unwrap()
    }

    #[test]
    fn test_window_respects_char_budget() {
        let text = "0123456789ABCDEFGHIJ";
        let window = ContextWindow::around(text, 8, 12, 3);
        assert_eq!(window.before, "567");
        assert_eq!(window.after, "CDE");
    }

    #[test]
    fn test_window_handles_multibyte_text() {
        let text = "café Zoë 2000";
        let start = text.find("2000").unwrap();
        let window = ContextWindow::around(text, start, text.len(), 4);
        assert_eq!(window.before, "Zoë ");
        assert_eq!(window.after, "");
    }

    #[test]
    fn test_leading_label_and_keyword() {
        let scorer = scorer();
        let text = "Medicare: 2123 45670 1";
        let window = ContextWindow::around(text, 10, text.len(), 40);
        let adjustment = scorer.score_adjustment(&window, &EntityType::AU_MEDICARE);
        assert!((adjustment.delta - 0.3).abs() < 1e-6);
        assert!(!adjustment.contradicted);
    }

    #[test]
    fn test_contradiction_before_date() {
        let scorer = scorer();
        let text = "Sydney NSW 2000";
        let start = text.find("2000").unwrap();
        let window = ContextWindow::around(text, start, text.len(), 40);
        assert!(scorer.is_contradicted(&window, &EntityType::DATE));
        assert!(scorer.score_adjustment(&window, &EntityType::DATE).contradicted);
    }

    #[test]
    fn test_unknown_type_is_neutral() {
        let scorer = scorer();
        let window = ContextWindow::around("abc", 0, 3, 10);
        assert_eq!(
            scorer.score_adjustment(&window, &EntityType::PERSON),
            ContextAdjustment::default()
        );
    }

    #[test]
    fn test_keyword_adjustment_required_context() {
        let scorer = scorer();
        let window = ContextWindow::around("ref 123456", 4, 10, 40);
        let keywords = vec!["account".to_string()];
        assert_eq!(scorer.keyword_adjustment(&window, &keywords, false, 0.2), 0.0);
        assert_eq!(scorer.keyword_adjustment(&window, &keywords, true, 0.2), -0.2);
        let window = ContextWindow::around("Account 123456", 8, 14, 40);
        assert_eq!(scorer.keyword_adjustment(&window, &keywords, true, 0.2), 0.1);
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let mut scorer = ContextScorer::new(0.1);
        let result = scorer.add_profile(
            EntityType::PERSON,
            &ContextDefinition {
                keywords: vec![],
                leading: vec!["(unclosed".to_string()],
                contradicting: vec![],
            },
        );
        assert!(matches!(result, Err(VeilError::Configuration(_))));
    }
}
