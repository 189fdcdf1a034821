//! Rule-driven pattern matcher

use super::context::{ContextScorer, ContextWindow};
use super::patterns::{PatternRegistry, PatternRule};
use crate::anonymization::models::Span;
use std::sync::Arc;

/// Default context window in characters on each side of a match
pub const DEFAULT_CONTEXT_WINDOW: usize = 40;

/// Default score penalty when a rule requires context and none is found
pub const DEFAULT_MISSING_CONTEXT_PENALTY: f32 = 0.2;

/// Runs every rule of a registry over a text
///
/// Rules run independently over the whole text and every match is kept;
/// deciding between overlapping candidates is left to the resolver.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    registry: Arc<PatternRegistry>,
    scorer: Arc<ContextScorer>,
    context_window: usize,
    missing_context_penalty: f32,
}

impl PatternMatcher {
    /// Create a matcher over a compiled registry
    pub fn new(registry: Arc<PatternRegistry>, scorer: Arc<ContextScorer>) -> Self {
        Self {
            registry,
            scorer,
            context_window: DEFAULT_CONTEXT_WINDOW,
            missing_context_penalty: DEFAULT_MISSING_CONTEXT_PENALTY,
        }
    }

    /// Set the context window size
    pub fn with_context_window(mut self, chars: usize) -> Self {
        self.context_window = chars;
        self
    }

    /// Set the missing context penalty
    pub fn with_missing_context_penalty(mut self, penalty: f32) -> Self {
        self.missing_context_penalty = penalty.max(0.0);
        self
    }

    /// Compiled rules
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Context window size in characters
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Produce every raw candidate in `text`
    pub fn find_candidates(&self, text: &str) -> Vec<Span> {
        let mut candidates = Vec::new();
        for rule in self.registry.all_rules() {
            self.match_rule(rule, text, &mut candidates);
        }

        tracing::trace!(
            rules = self.registry.len(),
            candidates = candidates.len(),
            "Pattern matching complete"
        );
        candidates
    }

    fn match_rule(&self, rule: &PatternRule, text: &str, out: &mut Vec<Span>) {
        for expression in &rule.expressions {
            for (start, end) in expression.find_intervals(text, rule.group) {
                let window = ContextWindow::around(text, start, end, self.context_window);
                if rule.is_excluded(window.before, window.after) {
                    continue;
                }

                let score = rule.score
                    + self.scorer.keyword_adjustment(
                        &window,
                        &rule.context,
                        rule.require_context,
                        self.missing_context_penalty,
                    )
                    + self.scorer.score_adjustment(&window, &rule.entity_type).delta;

                if let Some(span) = Span::from_source(
                    text,
                    start,
                    end,
                    rule.entity_type.clone(),
                    score,
                    rule.name.as_str(),
                ) {
                    out.push(span);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::detector::context::ContextDefinition;
    use crate::anonymization::models::EntityType;
    use std::collections::HashMap;

    fn matcher(rules: Vec<PatternRule>) -> PatternMatcher {
        let mut registry = PatternRegistry::new();
        for rule in rules {
            registry.add_rule(rule).unwrap();
        }
        PatternMatcher::new(Arc::new(registry), Arc::new(ContextScorer::new(0.1)))
    }

    #[test]
    fn test_every_match_is_kept() {
        let matcher = matcher(vec![
            PatternRule::new("ten_digits", EntityType::PHONE_NUMBER, &[r"\b\d{10}\b"], 0.75)
                .unwrap(),
            PatternRule::new("medicare", EntityType::AU_MEDICARE, &[r"\b[2-6]\d{9}\b"], 0.85)
                .unwrap(),
        ]);

        let candidates = matcher.find_candidates("Card 2123456701 and 0298765432");
        let types: Vec<&str> = candidates.iter().map(|s| s.entity_type.as_str()).collect();
        assert_eq!(types, vec!["PHONE_NUMBER", "PHONE_NUMBER", "AU_MEDICARE"]);
        assert_eq!(candidates[2].text, "2123456701");
        assert_eq!(candidates[2].source, "medicare");
    }

    #[test]
    fn test_capture_group_narrows_span() {
        let matcher = matcher(vec![PatternRule::new(
            "bsb_labeled",
            EntityType::AU_BSB,
            &[r"BSB\s*:?\s*(\d{3}-?\d{3})\b"],
            0.9,
        )
        .unwrap()
        .with_group(Some(1))]);

        let candidates = matcher.find_candidates("BSB : 062-000");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].start, 6);
        assert_eq!(candidates[0].text, "062-000");
    }

    #[test]
    fn test_keyword_bonus_and_missing_context_penalty() {
        let rule = PatternRule::new("acct", EntityType::AU_ACCOUNT_NUMBER, &[r"\b\d{8}\b"], 0.6)
            .unwrap()
            .with_context(&["account"], true);
        let matcher = matcher(vec![rule]);

        let with_context = matcher.find_candidates("Account 12345678");
        assert!((with_context[0].score - 0.7).abs() < 1e-6);

        let without_context = matcher.find_candidates("Ref 12345678");
        assert!((without_context[0].score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_exclusion_terms_discard_match() {
        let rule = PatternRule::new("amount", EntityType::NUMBER, &[r"\b\d+\b"], 0.5)
            .unwrap()
            .with_exclusions(&["invoice"], &["kg"]);
        let matcher = matcher(vec![rule]);

        let candidates = matcher.find_candidates("Invoice 42, weight 7 kg, items 3");
        let texts: Vec<&str> = candidates.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["3"]);
    }

    #[test]
    fn test_profile_leading_label_raises_score() {
        let mut profiles = HashMap::new();
        profiles.insert(
            "AU_TFN".to_string(),
            ContextDefinition {
                keywords: vec![],
                leading: vec![r"tfn\s*:?\s*$".to_string()],
                contradicting: vec![],
            },
        );
        let scorer = ContextScorer::from_definitions(&profiles, 0.1).unwrap();
        let mut registry = PatternRegistry::new();
        registry
            .add_rule(PatternRule::new("tfn", EntityType::AU_TFN, &[r"\b\d{9}\b"], 0.6).unwrap())
            .unwrap();
        let matcher = PatternMatcher::new(Arc::new(registry), Arc::new(scorer));

        let candidates = matcher.find_candidates("TFN: 123456782");
        assert!((candidates[0].score - 0.8).abs() < 1e-6);
    }
}
